//! Connection lifecycle.
//!
//! [`HttpConnection`] wraps one accepted socket and enforces the order of its
//! single exchange: read the request once, write at most one response, close.
//! See the type documentation for the stage rules.

mod http_connection;

pub use http_connection::HttpConnection;
