use std::fmt;
use std::io;

use thiserror::Error;

/// The listener operation that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SocketErrorKind {
    Create,
    Bind,
    Listen,
    Accept,
}

impl fmt::Display for SocketErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SocketErrorKind::Create => "cannot create socket",
            SocketErrorKind::Bind => "cannot bind socket",
            SocketErrorKind::Listen => "cannot listen on socket",
            SocketErrorKind::Accept => "cannot accept connection",
        };
        f.write_str(text)
    }
}

/// A listener failure, tagged with what failed and where.
///
/// `Create`, `Bind` and `Listen` are fatal to starting a server. `Accept` only
/// costs the one connection and the accept loop carries on.
#[derive(Debug, Error)]
#[error("{kind} for {address}:{port}: {source}")]
pub struct SocketError {
    kind: SocketErrorKind,
    address: String,
    port: u16,
    #[source]
    source: io::Error,
}

impl SocketError {
    pub fn new(kind: SocketErrorKind, address: impl Into<String>, port: u16, source: io::Error) -> Self {
        Self { kind, address: address.into(), port, source }
    }

    pub fn kind(&self) -> SocketErrorKind {
        self.kind
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ServerBuildError {
    #[error("handler must be set")]
    MissingHandler,
    #[error("max request size must be greater than zero")]
    InvalidMaxRequestSize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn socket_error_display() {
        let error = SocketError::new(SocketErrorKind::Bind, "127.0.0.1", 80, io::Error::from(io::ErrorKind::AddrInUse));
        assert!(error.to_string().starts_with("cannot bind socket for 127.0.0.1:80: "));
        assert_eq!(error.kind(), SocketErrorKind::Bind);
    }

    #[test]
    fn socket_error_keeps_os_error_as_source() {
        use std::error::Error;

        let error = SocketError::new(SocketErrorKind::Accept, "0.0.0.0", 8080, io::Error::from(io::ErrorKind::ConnectionAborted));
        let source = error.source().and_then(|e| e.downcast_ref::<io::Error>()).unwrap();
        assert_eq!(source.kind(), io::ErrorKind::ConnectionAborted);
    }
}
