/// Core error type for sheetwatch.
///
/// Adapter crates map their specific errors into this type so the poll loop can
/// tell rate limiting (retryable) apart from everything else.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("rate limited by data source (status {status})")]
    RateLimited { status: u16 },

    #[error("failed to execute {call} after {retries} retries due to rate limiting")]
    RetriesExhausted { call: String, retries: u32 },

    #[error("data source error: {0}")]
    Source(String),

    #[error("external error: {0}")]
    External(String),
}

impl Error {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Error::RateLimited { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
