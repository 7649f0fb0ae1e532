use std::io;
use std::time::Duration;

use http::StatusCode;
use thiserror::Error;

use crate::protocol::Stage;

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("request error: {source}")]
    RequestError {
        #[from]
        source: ParseError,
    },

    #[error("response error: {source}")]
    ResponseError {
        #[from]
        source: SendError,
    },

    #[error("`{operation}` is not allowed while the connection is {stage}")]
    StageViolation { operation: &'static str, stage: Stage },
}

impl HttpError {
    pub fn stage_violation(operation: &'static str, stage: Stage) -> Self {
        Self::StageViolation { operation, stage }
    }
}

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("request too large, current: {current_size} exceed the limit {max_size}")]
    TooLargeRequest { current_size: usize, max_size: usize },

    #[error("header number exceed the limit {max_num}")]
    TooManyHeaders { max_num: usize },

    #[error("invalid header: {reason}")]
    InvalidHeader { reason: String },

    #[error("invalid http version: {0:?}")]
    InvalidVersion(Option<u8>),

    #[error("invalid http method")]
    InvalidMethod,

    #[error("invalid http uri")]
    InvalidUri,

    #[error("invalid content-length header: {reason}")]
    InvalidContentLength { reason: String },

    #[error("invalid body: {reason}")]
    InvalidBody { reason: String },

    #[error("no data received within {timeout:?}")]
    Timeout { timeout: Duration },

    #[error("connection closed before a request was received")]
    ConnectionClosed,

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl ParseError {
    pub fn too_large_request(current_size: usize, max_size: usize) -> Self {
        Self::TooLargeRequest { current_size, max_size }
    }

    pub fn too_many_headers(max_num: usize) -> Self {
        Self::TooManyHeaders { max_num }
    }

    pub fn invalid_header<S: ToString>(str: S) -> Self {
        Self::InvalidHeader { reason: str.to_string() }
    }

    pub fn invalid_body<S: ToString>(str: S) -> Self {
        Self::InvalidBody { reason: str.to_string() }
    }

    pub fn invalid_content_length<S: ToString>(str: S) -> Self {
        Self::InvalidContentLength { reason: str.to_string() }
    }

    pub fn is_too_large(&self) -> bool {
        matches!(self, Self::TooLargeRequest { .. })
    }

    /// The status to answer with, or `None` when the peer is gone or silent
    /// and nothing should be written.
    pub fn response_status(&self) -> Option<StatusCode> {
        match self {
            Self::TooLargeRequest { .. } => Some(StatusCode::PAYLOAD_TOO_LARGE),
            Self::Timeout { .. } | Self::ConnectionClosed | Self::Io { .. } => None,
            _ => Some(StatusCode::BAD_REQUEST),
        }
    }
}

#[derive(Error, Debug)]
pub enum SendError {
    #[error("invalid body: {reason}")]
    InvalidBody { reason: String },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl SendError {
    pub fn invalid_body<S: ToString>(str: S) -> Self {
        Self::InvalidBody { reason: str.to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_for_parse_errors() {
        assert_eq!(ParseError::too_large_request(150, 100).response_status(), Some(StatusCode::PAYLOAD_TOO_LARGE));
        assert_eq!(ParseError::InvalidMethod.response_status(), Some(StatusCode::BAD_REQUEST));
        assert_eq!(ParseError::ConnectionClosed.response_status(), None);
        assert_eq!(ParseError::Timeout { timeout: Duration::from_secs(1) }.response_status(), None);
        assert_eq!(ParseError::from(io::Error::from(io::ErrorKind::ConnectionReset)).response_status(), None);
    }

    #[test]
    fn stage_violation_message() {
        let error = HttpError::stage_violation("write_response", Stage::Accepted);
        assert_eq!(error.to_string(), "`write_response` is not allowed while the connection is accepted");
    }
}
