//! Response head encoder.
//!
//! Writes `HTTP/1.1 <code> <reason>`, sets the framing header that matches
//! the payload size and always announces `Connection: close`, since every
//! connection carries exactly one exchange.

use std::io;
use std::io::Write;

use bytes::{BufMut, BytesMut};
use http::{HeaderValue, header};
use tokio_util::codec::Encoder;

use crate::protocol::{PayloadSize, ReasonPhrase, ResponseHead, SendError, reason_phrase};

/// Initial buffer size allocated for header serialization
const INIT_HEADER_SIZE: usize = 1024;

const CLOSE: HeaderValue = HeaderValue::from_static("close");
const CHUNKED: HeaderValue = HeaderValue::from_static("chunked");
const ZERO: HeaderValue = HeaderValue::from_static("0");

/// Encoder for the response head.
#[derive(Debug, Clone, Copy)]
pub struct HeaderEncoder;

impl Encoder<(ResponseHead, PayloadSize)> for HeaderEncoder {
    type Error = SendError;

    fn encode(&mut self, item: (ResponseHead, PayloadSize), dst: &mut BytesMut) -> Result<(), Self::Error> {
        let (mut head, payload_size) = item;

        let status = head.status();
        let reason = head.extensions().get::<ReasonPhrase>().map_or_else(|| reason_phrase(status), ReasonPhrase::as_str);

        dst.reserve(INIT_HEADER_SIZE);
        write!(FastWrite(dst), "HTTP/1.1 {} {}\r\n", status.as_str(), reason)?;

        let headers = head.headers_mut();
        match payload_size {
            PayloadSize::Length(n) => {
                headers.remove(header::TRANSFER_ENCODING);
                headers.insert(header::CONTENT_LENGTH, n.into());
            }
            PayloadSize::Chunked => {
                headers.remove(header::CONTENT_LENGTH);
                headers.insert(header::TRANSFER_ENCODING, CHUNKED);
            }
            PayloadSize::Empty => {
                headers.remove(header::TRANSFER_ENCODING);
                headers.insert(header::CONTENT_LENGTH, ZERO);
            }
        }
        headers.insert(header::CONNECTION, CLOSE);

        for (header_name, header_value) in head.headers() {
            dst.put_slice(header_name.as_ref());
            dst.put_slice(b": ");
            dst.put_slice(header_value.as_ref());
            dst.put_slice(b"\r\n");
        }
        dst.put_slice(b"\r\n");
        Ok(())
    }
}

/// `io::Write` adapter so `write!` can format straight into the buffer.
struct FastWrite<'a>(&'a mut BytesMut);

impl Write for FastWrite<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.put_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{Response, StatusCode};

    fn encode(head: ResponseHead, payload_size: PayloadSize) -> String {
        let mut dst = BytesMut::new();
        HeaderEncoder.encode((head, payload_size), &mut dst).unwrap();
        String::from_utf8(dst.to_vec()).unwrap()
    }

    #[test]
    fn status_line_uses_reason_table() {
        let head = Response::builder().status(StatusCode::PAYLOAD_TOO_LARGE).body(()).unwrap();
        let text = encode(head, PayloadSize::Length(10));

        assert!(text.starts_with("HTTP/1.1 413 Request Entity Too Large\r\n"));
        assert!(text.contains("content-length: 10\r\n"));
        assert!(text.contains("connection: close\r\n"));
        assert!(text.ends_with("\r\n\r\n"));
    }

    #[test]
    fn reason_override() {
        let mut head = Response::builder().status(StatusCode::OK).body(()).unwrap();
        head.extensions_mut().insert(ReasonPhrase::new("Fine Thanks").unwrap());

        assert!(encode(head, PayloadSize::Empty).starts_with("HTTP/1.1 200 Fine Thanks\r\n"));
    }

    #[test]
    fn framing_replaces_handler_headers() {
        let head = Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_LENGTH, "999")
            .header(header::CONNECTION, "keep-alive")
            .body(())
            .unwrap();
        let text = encode(head, PayloadSize::Chunked);

        assert!(text.contains("transfer-encoding: chunked\r\n"));
        assert!(!text.contains("content-length"));
        assert!(!text.contains("keep-alive"));
    }

    #[test]
    fn empty_body_has_zero_length() {
        let head = Response::builder().status(StatusCode::NO_CONTENT).body(()).unwrap();
        assert!(encode(head, PayloadSize::Empty).contains("content-length: 0\r\n"));
    }
}
