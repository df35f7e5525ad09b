pub mod client;
pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use client::HttpTicketingClient;
pub use config::*;
pub use error::TicketingError;
pub use traits::*;
pub use types::*;
