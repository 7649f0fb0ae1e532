//! The accept side of the server.
//!
//! A [`Listener`] owns the listening socket, the accept loop hands every
//! accepted socket to its own worker task, and each worker drives one
//! [`HttpConnection`](crate::connection::HttpConnection) from request to close.
//! [`Server`] ties these together with the handler and the [`ServerConfig`].

mod accept;
mod config;
mod error;
mod listener;
mod server;
mod signal;
mod worker;

pub use accept::Accept;
pub use config::ServerConfig;
pub use error::{ServerBuildError, SocketError, SocketErrorKind};
pub use listener::{Listener, StopHandle};
pub use server::{Server, ServerBuilder};
