//! A single-listener HTTP/1.1 server that serves exactly one request per connection
//!
//! Every accepted socket gets its own task and is driven through a fixed
//! lifecycle: read one request, hand it to a handler, write one response,
//! close. The lifecycle is enforced by the connection itself, so a response can
//! never precede its request or be written twice.
//!
//! # Features
//!
//! - HTTP/1.0 and HTTP/1.1 request parsing with `Content-Length` and chunked bodies
//! - A hard ceiling on request size, counted over head and body, answered with `413`
//! - Per-read timeout against stalled clients
//! - `500` when a handler produces no response
//! - Graceful stop on `SIGINT`, `SIGTERM` and `SIGHUP`
//!
//! # Example
//!
//! ```no_run
//! use bytes::Bytes;
//! use http::{Response, StatusCode};
//! use http_body_util::Full;
//! use oneshot_http::handler::make_handler;
//! use oneshot_http::protocol::SharedRequest;
//! use oneshot_http::server::Server;
//! use std::error::Error;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
//!     let server = Server::builder()
//!         .address("127.0.0.1")
//!         .port(8080)
//!         .max_request_size(16 * 1024)
//!         .handler(make_handler(hello_world))
//!         .build()?;
//!
//!     server.start().await?;
//!     Ok(())
//! }
//!
//! async fn hello_world(request: SharedRequest) -> Result<Option<Response<Full<Bytes>>>, Box<dyn Error + Send + Sync>> {
//!     if request.uri().path() != "/" {
//!         // answered with 500 by the server
//!         return Ok(None);
//!     }
//!
//!     let response = Response::builder().status(StatusCode::OK).body(Full::new(Bytes::from_static(b"Hello World!\r\n")))?;
//!     Ok(Some(response))
//! }
//! ```
//!
//! # Architecture
//!
//! - [`server`]: listener, accept loop, per-connection workers, signals and configuration
//! - [`connection`]: the stage-guarded connection driving one exchange
//! - [`codec`]: the bounded request decoder and the response encoder
//! - [`protocol`]: request, response, stage and error types
//! - [`handler`]: the request handler and error handler boundary
//!
//! # Error Handling
//!
//! - [`server::SocketError`]: listener setup and accept failures
//! - [`protocol::HttpError`]: connection level errors, including stage violations
//! - [`protocol::ParseError`]: request parsing errors, see [`protocol::ParseError::response_status`]
//! - [`protocol::SendError`]: response sending errors
//!
//! # Limitations
//!
//! - No keep-alive: every response carries `Connection: close`
//! - No HTTP/2, no TLS
//! - Maximum number of headers: 64

pub mod codec;
pub mod connection;
pub mod handler;
pub mod protocol;
pub mod server;

mod utils;
pub(crate) use utils::ensure;
