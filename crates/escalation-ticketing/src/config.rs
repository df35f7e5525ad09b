use std::time::Duration;

/// Per-operation deadlines. A deadline hit is a miss for that source; nothing is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TicketingTimeouts {
    pub freshness: Duration,
    pub lookup: Duration,
    pub status: Duration,
    pub search: Duration,
    pub execute: Duration,
}

impl Default for TicketingTimeouts {
    fn default() -> Self {
        Self {
            freshness: Duration::from_secs(5),
            lookup: Duration::from_secs(10),
            status: Duration::from_secs(15),
            search: Duration::from_secs(30),
            execute: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TicketingConfig {
    pub base_url: String,
    pub timeouts: TicketingTimeouts,
}

impl TicketingConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeouts: TicketingTimeouts::default(),
        }
    }
}
