use std::time::Duration;

/// Limits applied to every connection the server accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Ceiling for one request, head and body bytes together.
    pub max_request_size: usize,
    /// Pending-connection queue length handed to `listen`.
    pub backlog: u32,
    /// How long a single read may wait for client bytes.
    pub read_timeout: Duration,
}

impl ServerConfig {
    pub const DEFAULT_MAX_REQUEST_SIZE: usize = 8192;
    pub const DEFAULT_BACKLOG: u32 = 5;
    pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_request_size: Self::DEFAULT_MAX_REQUEST_SIZE,
            backlog: Self::DEFAULT_BACKLOG,
            read_timeout: Self::DEFAULT_READ_TIMEOUT,
        }
    }
}
