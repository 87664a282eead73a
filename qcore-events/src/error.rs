use qcore_shared::CoreErrorKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EventBusError {
    #[error("malformed inbound message: {0}")]
    MalformedMessage(String),

    #[error("socket {0} is not registered")]
    UnknownSocket(String),
}

impl EventBusError {
    pub fn kind(&self) -> CoreErrorKind {
        match self {
            EventBusError::MalformedMessage(_) => CoreErrorKind::Contract,
            EventBusError::UnknownSocket(_) => CoreErrorKind::NotFound,
        }
    }
}
