//! Wires the five components (spec.md §2 "System overview") into one
//! running process: connects the PSS, builds the task queue and workers,
//! registers alert strategies and scheduled jobs, and exposes the event
//! bus over a WebSocket route.

mod jobs;
mod strategies;
mod ws;

use std::sync::Arc;

use qcore_alerts::{AlertEngine, TickerIndex};
use qcore_events::EventBus;
use qcore_queue::TaskQueue;
use qcore_scheduler::{Scheduler, SchedulerBuilder, SchedulerHandle};
use qcore_shared::{CacheStore, CoreConfig, Event, SqlStore};
use qcore_worker::{FunctionRegistry, Worker};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

pub use ws::ws_handler;

/// Number of in-process `Worker`s consuming the task queue. One is enough
/// to exercise the protocol; scale out by running additional `qcore-app`
/// processes against the same PSS for real throughput (spec.md §4.2
/// "multiple worker processes").
const WORKER_POOL_SIZE: usize = 2;

/// Everything a running service needs, already connected and registered.
/// Not `Clone`: each handle (scheduler, workers) is owned once and
/// consumed by [`App::run`].
pub struct App {
    pub config: CoreConfig,
    pub cache: CacheStore,
    pub sql: SqlStore,
    pub queue: TaskQueue,
    pub alert_engine: AlertEngine,
    pub event_bus: EventBus,
    scheduler: Scheduler,
    worker_cancel: CancellationToken,
    workers: Vec<Worker>,
}

/// Connects to the PSS and assembles every component, but starts nothing
/// yet — callers choose when to call [`App::run`] (or drive the pieces
/// individually, e.g. in tests).
pub async fn bootstrap(config: CoreConfig) -> anyhow::Result<App> {
    let cache = CacheStore::connect(&config.redis).await?;
    let sql = SqlStore::connect(&config.postgres).await?;
    let queue = TaskQueue::new(cache.clone(), config.queue.clone());

    let (events_tx, events_rx) = mpsc::unbounded_channel::<Event>();

    let strategies = strategies::default_registry(&config.alerts);
    let alert_engine = AlertEngine::new(cache.clone(), strategies, config.alerts.clone(), events_tx);

    let event_bus = EventBus::new(config.events.clone());
    tokio::spawn({
        let event_bus = event_bus.clone();
        async move { event_bus.run(events_rx).await }
    });

    let ticker_index = TickerIndex::new(cache.clone());
    let scheduler = SchedulerBuilder::new()
        .add_job(jobs::ticker_index_gc(ticker_index, &config.alerts))?
        .build(cache.clone(), queue.clone(), config.scheduler.clone());

    let function_registry = FunctionRegistry::new();
    let workers = (0..WORKER_POOL_SIZE)
        .map(|_| Worker::new(queue.clone(), function_registry.clone()))
        .collect();

    Ok(App {
        config,
        cache,
        sql,
        queue,
        alert_engine,
        event_bus,
        scheduler,
        worker_cancel: CancellationToken::new(),
        workers,
    })
}

/// A started [`App`]: holds the handles needed to stop everything in
/// reverse order (spec.md §4.4 "Shutdown").
pub struct RunningApp {
    scheduler_handle: SchedulerHandle,
    alert_engine: AlertEngine,
    worker_cancel: CancellationToken,
    worker_handles: Vec<tokio::task::JoinHandle<()>>,
}

impl App {
    /// Starts workers, the alert loop, and the scheduler's 60s main loop.
    /// Does not block; returns a handle used to stop everything cleanly.
    pub async fn run(self) -> anyhow::Result<RunningApp> {
        let worker_handles = self
            .workers
            .into_iter()
            .map(|worker| {
                let cancel = self.worker_cancel.clone();
                tokio::spawn(async move { worker.run(cancel).await })
            })
            .collect();

        self.alert_engine.start().await?;
        let scheduler_handle = self.scheduler.start().await;

        Ok(RunningApp {
            scheduler_handle,
            alert_engine: self.alert_engine,
            worker_cancel: self.worker_cancel,
            worker_handles,
        })
    }

    /// Cheap synchronous health summary used by the `/healthz` route
    /// (SPEC_FULL.md §4 "Health reporting"): every component's own
    /// `is_healthy()` must agree, so a single tripped circuit breaker on
    /// the PSS is enough to flip the process unhealthy even if sockets
    /// are still connected.
    pub fn is_healthy(&self) -> bool {
        self.cache.is_healthy() && self.sql.is_healthy() && self.event_bus.is_healthy()
    }
}

impl RunningApp {
    /// Reverse-order shutdown: stop the scheduler (which runs its own
    /// shutdown hooks first), then the alert loop, then cancel workers
    /// and wait for their current task to finish.
    pub async fn stop(self) {
        self.scheduler_handle.stop().await;
        self.alert_engine.stop().await;

        self.worker_cancel.cancel();
        for handle in self.worker_handles {
            let _ = handle.await;
        }
    }
}

/// Shared application state handed to axum route handlers.
#[derive(Clone)]
pub struct AppState {
    pub event_bus: EventBus,
    pub cache: CacheStore,
    pub sql: SqlStore,
}

impl AppState {
    pub fn new(app: &App) -> Self {
        Self {
            event_bus: app.event_bus.clone(),
            cache: app.cache.clone(),
            sql: app.sql.clone(),
        }
    }

    /// Mirrors [`App::is_healthy`] for the `/healthz` route.
    pub fn is_healthy(&self) -> bool {
        self.cache.is_healthy() && self.sql.is_healthy() && self.event_bus.is_healthy()
    }
}

pub fn router(state: AppState) -> axum::Router {
    use axum::routing::get;

    axum::Router::new()
        .route("/healthz", get(ws::health_handler))
        .route("/ws", get(ws::ws_handler))
        .with_state(Arc::new(state))
}
