//! # Logging Initialization
//!
//! Every binary in the workspace calls [`init`] exactly once, at the top of
//! `main`, before anything else runs. It installs a `tracing-subscriber`
//! `fmt` layer driven by `RUST_LOG` (defaulting to `info`), so every
//! component's logs share one format and one verbosity knob.

use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, EnvFilter};

static LOGGER_INIT: OnceCell<()> = OnceCell::new();

/// Initialize the global tracing subscriber for `service_name`.
///
/// Safe to call more than once (and from more than one component sharing a
/// process, as `qcore-app` does); only the first call takes effect.
///
/// Set `QCORE_LOG_JSON=1` to switch to JSON output for log shipping.
pub fn init(service_name: &'static str) {
    LOGGER_INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let json = std::env::var("QCORE_LOG_JSON")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        let subscriber = fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(true)
            .with_line_number(true)
            .with_span_events(fmt::format::FmtSpan::CLOSE);

        if json {
            subscriber.json().init();
        } else {
            subscriber.init();
        }

        tracing::info!(service = service_name, "logging initialized");
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent() {
        init("qcore-test");
        init("qcore-test");
    }
}
