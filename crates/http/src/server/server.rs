use std::fmt;
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use http_body::Body;
use tokio_util::task::TaskTracker;
use tracing::info;

use crate::handler::{ErrorHandler, Handler};
use crate::server::accept::{Accept, accept_loop};
use crate::server::signal::stop_on_signal;
use crate::server::worker::Worker;
use crate::server::{Listener, ServerBuildError, ServerConfig, SocketError, StopHandle};

const DEFAULT_ADDRESS: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;

pub struct ServerBuilder<H> {
    address: String,
    port: u16,
    handler: Option<H>,
    error_handler: Option<Arc<dyn ErrorHandler>>,
    config: ServerConfig,
}

impl<H> fmt::Debug for ServerBuilder<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerBuilder")
            .field("address", &self.address)
            .field("port", &self.port)
            .field("has_handler", &self.handler.is_some())
            .field("has_error_handler", &self.error_handler.is_some())
            .field("config", &self.config)
            .finish()
    }
}

impl<H> ServerBuilder<H> {
    fn new() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_string(),
            port: DEFAULT_PORT,
            handler: None,
            error_handler: None,
            config: ServerConfig::default(),
        }
    }

    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.address = address.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn handler(mut self, handler: H) -> Self {
        self.handler = Some(handler);
        self
    }

    pub fn error_handler(mut self, error_handler: impl ErrorHandler + 'static) -> Self {
        self.error_handler = Some(Arc::new(error_handler));
        self
    }

    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn max_request_size(mut self, max_request_size: usize) -> Self {
        self.config.max_request_size = max_request_size;
        self
    }

    pub fn backlog(mut self, backlog: u32) -> Self {
        self.config.backlog = backlog;
        self
    }

    pub fn read_timeout(mut self, read_timeout: Duration) -> Self {
        self.config.read_timeout = read_timeout;
        self
    }

    pub fn build(self) -> Result<Server<H>, ServerBuildError> {
        let handler = self.handler.ok_or(ServerBuildError::MissingHandler)?;
        if self.config.max_request_size == 0 {
            return Err(ServerBuildError::InvalidMaxRequestSize);
        }

        Ok(Server {
            address: self.address,
            port: self.port,
            handler: Arc::new(handler),
            error_handler: self.error_handler,
            config: Arc::new(self.config),
        })
    }
}

/// A single-listener HTTP/1.1 server answering one request per connection.
///
/// Every accepted connection runs in its own task, reads one request, hands
/// it to the [`Handler`] and closes after the response. `SIGINT`, `SIGTERM`
/// and `SIGHUP` stop the server; connections in flight finish first.
///
/// ```no_run
/// use bytes::Bytes;
/// use http::Response;
/// use http_body_util::Full;
/// use oneshot_http::handler::make_handler;
/// use oneshot_http::protocol::SharedRequest;
/// use oneshot_http::server::Server;
/// use std::convert::Infallible;
///
/// async fn hello(_req: SharedRequest) -> Result<Option<Response<Full<Bytes>>>, Infallible> {
///     Ok(Some(Response::new(Full::new(Bytes::from_static(b"hello")))))
/// }
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let server = Server::builder().address("127.0.0.1").port(8080).handler(make_handler(hello)).build()?;
/// server.start().await?;
/// # Ok(())
/// # }
/// ```
pub struct Server<H> {
    address: String,
    port: u16,
    handler: Arc<H>,
    error_handler: Option<Arc<dyn ErrorHandler>>,
    config: Arc<ServerConfig>,
}

impl<H> fmt::Debug for Server<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Server")
            .field("address", &self.address)
            .field("port", &self.port)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<H> Server<H> {
    pub fn builder() -> ServerBuilder<H> {
        ServerBuilder::new()
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Creates, binds and starts the listener for the configured address.
    pub async fn bind(&self) -> Result<Listener, SocketError> {
        Listener::open(self.address.as_str(), self.port, self.config.backlog).await
    }
}

impl<H> Server<H>
where
    H: Handler + Send + Sync + 'static,
    H::RespBody: Send + Unpin,
    <H::RespBody as Body>::Data: Send,
    <H::RespBody as Body>::Error: Display + Send,
{
    /// Binds and serves until stopped by a signal.
    ///
    /// # Errors
    ///
    /// Returns the [`SocketError`] if the listener could not be set up.
    pub async fn start(&self) -> Result<(), SocketError> {
        let listener = self.bind().await?;
        self.serve(listener).await;
        Ok(())
    }

    /// Serves on an already listening socket until its [`StopHandle`] fires,
    /// either from a signal or from a clone held by the caller.
    pub async fn serve(&self, mut listener: Listener) {
        let stop = listener.stop_handle();
        let signals = tokio::spawn(stop_on_signal(stop.clone()));

        self.serve_with(&mut listener, &stop).await;

        signals.abort();
    }

    /// Runs the accept loop on any [`Accept`] source until `stop` fires, then
    /// stops the source and waits for in-flight workers.
    pub async fn serve_with<A: Accept>(&self, acceptor: &mut A, stop: &StopHandle) {
        let tracker = TaskTracker::new();
        let worker = Worker::new(Arc::clone(&self.handler), self.error_handler.clone(), Arc::clone(&self.config));

        info!(address = %self.address, port = self.port, max_request_size = self.config.max_request_size, "server started");
        let accepted = accept_loop(acceptor, stop, |stream, peer| worker.spawn(&tracker, stream, peer)).await;

        acceptor.stop();
        tracker.close();
        info!(accepted, in_flight = tracker.len(), "server stopping, waiting for connections");
        tracker.wait().await;
        info!("server stopped");
    }
}
