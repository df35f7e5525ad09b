use thiserror::Error;

#[derive(Debug, Error)]
pub enum TicketingError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("ticketing backend returned invalid response: {0}")]
    InvalidResponse(String),

    #[error("ticketing backend error: status={status}, body={body}")]
    Api { status: u16, body: String },
}

impl TicketingError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Http(err) if err.is_timeout())
    }
}
