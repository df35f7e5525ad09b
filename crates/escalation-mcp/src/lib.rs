pub mod config;
pub mod context_store;
pub mod directory;
pub mod error;
pub mod health;
pub mod http;
pub mod protocol;
pub mod render;
pub mod repository;
pub mod resolver;
pub mod server;
pub mod session_cache;
pub mod stdio;
pub mod webhook;

pub use config::{ConfigError, ServerConfig, StoreKind, Transport};
pub use context_store::CallContextStore;
pub use directory::UserDirectory;
pub use error::ServerError;
pub use http::{router, serve_http};
pub use repository::{FreshnessOrigin, IncidentRepository, IncidentSource, Refreshed, StatusLookup};
pub use resolver::{IncidentContextResolver, ResolvedContext, SourceTag};
pub use server::{McpServer, TOOL_NAMES};
pub use session_cache::{SessionCache, SessionStore, VolatileSessions};
pub use stdio::{serve_stdio, serve_stream, MAX_FRAME_BYTES};
pub use webhook::{CallSetupEvent, CallSetupOutcome};
