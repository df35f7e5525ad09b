use escalation_storage::StoreError;
use escalation_ticketing::TicketingError;
use thiserror::Error;

use crate::config::ConfigError;

/// Startup failures. Once running, request handling degrades instead of erroring.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("store unavailable: {0}")]
    Store(#[from] StoreError),
    #[error("ticketing client: {0}")]
    Ticketing(#[from] TicketingError),
}
