//! Request head decoder.
//!
//! Parses the start-line and header block with `httparse` and decides how the
//! body is framed. The whole head must fit under the configured ceiling; a
//! head that is still incomplete once the buffer passes the ceiling is
//! rejected without reading further.
//!
//! # Limits
//!
//! - Maximum number of headers: 64
//! - Maximum head size: the request size ceiling
//! - HTTP/1.0 and HTTP/1.1 only

use bytes::BytesMut;
use http::{HeaderName, HeaderValue, Method, Request, Uri};
use httparse::{Error, Status};
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::ensure;

use crate::protocol::{ParseError, PayloadSize, RequestHeader};

/// Maximum number of headers allowed in a request
const MAX_HEADER_NUM: usize = 64;

/// Decoder for the request head.
///
/// Yields the parsed [`RequestHeader`], the body framing and the number of
/// bytes the head occupied on the wire.
#[derive(Debug, Clone, Copy)]
pub struct HeaderDecoder {
    max_bytes: usize,
}

impl HeaderDecoder {
    pub fn new(max_bytes: usize) -> Self {
        Self { max_bytes }
    }
}

impl Decoder for HeaderDecoder {
    type Item = (RequestHeader, PayloadSize, usize);
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.is_empty() {
            return Ok(None);
        }

        let mut headers = [httparse::EMPTY_HEADER; MAX_HEADER_NUM];
        let mut req = httparse::Request::new(&mut headers);

        let parsed_result = req.parse(src).map_err(|e| match e {
            Error::TooManyHeaders => ParseError::too_many_headers(MAX_HEADER_NUM),
            e => ParseError::invalid_header(e.to_string()),
        });

        let body_offset = match parsed_result? {
            Status::Complete(body_offset) => body_offset,
            Status::Partial => {
                ensure!(src.len() <= self.max_bytes, ParseError::too_large_request(src.len(), self.max_bytes));
                return Ok(None);
            }
        };

        trace!(head_size = body_offset, "parsed request head");
        ensure!(body_offset <= self.max_bytes, ParseError::too_large_request(body_offset, self.max_bytes));

        let version = match req.version {
            Some(0) => http::Version::HTTP_10,
            Some(1) => http::Version::HTTP_11,
            v => return Err(ParseError::InvalidVersion(v)),
        };
        let method = req.method.ok_or(ParseError::InvalidMethod)?;
        let method = Method::from_bytes(method.as_bytes()).map_err(|_| ParseError::InvalidMethod)?;
        let uri = req.path.ok_or(ParseError::InvalidUri)?;
        let uri = Uri::try_from(uri).map_err(|_| ParseError::InvalidUri)?;

        let header_count = req.headers.len();
        let mut header_index = [HeaderIndex::EMPTY; MAX_HEADER_NUM];
        HeaderIndex::record(src, req.headers, &mut header_index);

        let mut request = Request::new(());
        *request.method_mut() = method;
        *request.uri_mut() = uri;
        *request.version_mut() = version;

        let headers = request.headers_mut();
        headers.reserve(header_count);

        // names and values are sliced out of the frozen head, not copied
        let head_bytes = src.split_to(body_offset).freeze();
        for index in &header_index[..header_count] {
            let name = HeaderName::from_bytes(&head_bytes[index.name.0..index.name.1]).map_err(ParseError::invalid_header)?;
            let value =
                HeaderValue::from_maybe_shared(head_bytes.slice(index.value.0..index.value.1)).map_err(ParseError::invalid_header)?;
            headers.append(name, value);
        }

        let header = RequestHeader::from(request);
        let payload_size = parse_payload(&header)?;

        Ok(Some((header, payload_size, body_offset)))
    }
}

/// Byte ranges of one header's name and value inside the head buffer.
#[derive(Clone, Copy)]
struct HeaderIndex {
    name: (usize, usize),
    value: (usize, usize),
}

impl HeaderIndex {
    const EMPTY: HeaderIndex = HeaderIndex { name: (0, 0), value: (0, 0) };

    fn record(bytes: &[u8], headers: &[httparse::Header<'_>], indices: &mut [HeaderIndex]) {
        let bytes_ptr = bytes.as_ptr() as usize;
        for (header, index) in headers.iter().zip(indices.iter_mut()) {
            let name_start = header.name.as_ptr() as usize - bytes_ptr;
            index.name = (name_start, name_start + header.name.len());
            let value_start = header.value.as_ptr() as usize - bytes_ptr;
            index.value = (value_start, value_start + header.value.len());
        }
    }
}

/// Decides the body framing from `Transfer-Encoding` and `Content-Length`.
///
/// Follows RFC 9112 section 6: both headers together, a non-chunked transfer
/// coding, or conflicting lengths make the request malformed.
fn parse_payload(header: &RequestHeader) -> Result<PayloadSize, ParseError> {
    let headers = header.headers();
    let te_header = headers.get(http::header::TRANSFER_ENCODING);
    let mut cl_values = headers.get_all(http::header::CONTENT_LENGTH).iter();
    let cl_header = cl_values.next();

    match (te_header, cl_header) {
        (None, None) => Ok(PayloadSize::new_empty()),

        (te_value @ Some(_), None) => {
            ensure!(is_chunked(te_value), ParseError::invalid_header("transfer-encoding must end with chunked"));
            Ok(PayloadSize::new_chunked())
        }

        (None, Some(cl_value)) => {
            ensure!(
                cl_values.all(|other| other == cl_value),
                ParseError::invalid_content_length("multiple content-length values differ")
            );

            let cl_str = cl_value.to_str().map_err(|_| ParseError::invalid_content_length("value can't to_str"))?;
            let cl_str = cl_str.trim();
            ensure!(
                !cl_str.is_empty() && cl_str.bytes().all(|b| b.is_ascii_digit()),
                ParseError::invalid_content_length(format!("value {cl_str} is not a decimal length"))
            );
            let length =
                cl_str.parse::<u64>().map_err(|_| ParseError::invalid_content_length(format!("value {cl_str} is not u64")))?;

            Ok(PayloadSize::new_length(length))
        }

        (Some(_), Some(_)) => Err(ParseError::invalid_content_length("transfer_encoding and content_length both present in headers")),
    }
}

/// Chunked must be the final transfer coding when present.
fn is_chunked(header_value: Option<&HeaderValue>) -> bool {
    const CHUNKED: &[u8] = b"chunked";
    header_value
        .and_then(|value| value.as_bytes().rsplit(|b| *b == b',').next())
        .is_some_and(|last| last.trim_ascii().eq_ignore_ascii_case(CHUNKED))
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{HeaderMap, Version};
    use indoc::indoc;

    #[test]
    fn check_is_chunked() {
        let headers = HeaderMap::new();
        assert!(!is_chunked(headers.get(http::header::TRANSFER_ENCODING)));

        let mut headers = HeaderMap::new();
        headers.insert("Transfer-Encoding", "gzip, chunked".parse().unwrap());
        assert!(is_chunked(headers.get(http::header::TRANSFER_ENCODING)));

        headers.insert("Transfer-Encoding", "chunked, gzip".parse().unwrap());
        assert!(!is_chunked(headers.get(http::header::TRANSFER_ENCODING)));

        headers.insert("Transfer-Encoding", "Chunked".parse().unwrap());
        assert!(is_chunked(headers.get(http::header::TRANSFER_ENCODING)));
    }

    #[test]
    fn leaves_body_in_buffer() {
        let str = indoc! {r##"
        POST /submit HTTP/1.1
        Host: 127.0.0.1:8080
        Content-Length: 3

        123"##};

        let mut bytes = BytesMut::from(str);
        let (header, payload_size, head_len) = HeaderDecoder::new(8192).decode(&mut bytes).unwrap().unwrap();

        assert_eq!(header.method(), &Method::POST);
        assert_eq!(payload_size, PayloadSize::Length(3));
        assert_eq!(head_len, str.len() - 3);
        assert_eq!(&bytes[..], &b"123"[..]);
    }

    #[test]
    fn from_curl() {
        let str = indoc! {r##"
        GET /index.html?lang=en HTTP/1.1
        Host: 127.0.0.1:8080
        User-Agent: curl/7.79.1
        Accept: */*

        "##};

        let mut buf = BytesMut::from(str);
        let (header, payload_size, _) = HeaderDecoder::new(8192).decode(&mut buf).unwrap().unwrap();

        assert!(payload_size.is_empty());
        assert_eq!(header.method(), &Method::GET);
        assert_eq!(header.version(), Version::HTTP_11);
        assert_eq!(header.uri().path(), "/index.html");
        assert_eq!(header.uri().query(), Some("lang=en"));
        assert_eq!(header.headers().len(), 3);
        assert_eq!(header.headers().get("user-agent"), Some(&HeaderValue::from_static("curl/7.79.1")));
        assert!(buf.is_empty());
    }

    #[test]
    fn accepts_crlf_line_endings() {
        let mut buf = BytesMut::from(&b"GET / HTTP/1.0\r\nHost: localhost\r\n\r\n"[..]);
        let (header, _, head_len) = HeaderDecoder::new(8192).decode(&mut buf).unwrap().unwrap();

        assert_eq!(header.version(), Version::HTTP_10);
        assert_eq!(head_len, 35);
    }

    #[test]
    fn partial_head_waits_for_more() {
        let mut buf = BytesMut::from(&b"GET / HTTP/1.1\r\nHost: loc"[..]);
        assert!(HeaderDecoder::new(8192).decode(&mut buf).unwrap().is_none());
        assert_eq!(buf.len(), 25);
    }

    #[test]
    fn partial_head_over_ceiling() {
        let mut buf = BytesMut::from(&b"GET / HTTP/1.1\r\nX-Padding: aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"[..]);
        let error = HeaderDecoder::new(32).decode(&mut buf).unwrap_err();
        assert!(error.is_too_large());
    }

    #[test]
    fn complete_head_over_ceiling() {
        let mut buf = BytesMut::from(&b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n"[..]);
        let error = HeaderDecoder::new(20).decode(&mut buf).unwrap_err();
        assert!(matches!(error, ParseError::TooLargeRequest { current_size: 35, max_size: 20 }));
    }

    #[test]
    fn rejects_conflicting_framing() {
        let mut buf = BytesMut::from(&b"POST / HTTP/1.1\r\nContent-Length: 3\r\nTransfer-Encoding: chunked\r\n\r\n"[..]);
        let error = HeaderDecoder::new(8192).decode(&mut buf).unwrap_err();
        assert!(matches!(error, ParseError::InvalidContentLength { .. }));

        let mut buf = BytesMut::from(&b"POST / HTTP/1.1\r\nContent-Length: 3\r\nContent-Length: 4\r\n\r\n"[..]);
        let error = HeaderDecoder::new(8192).decode(&mut buf).unwrap_err();
        assert!(matches!(error, ParseError::InvalidContentLength { .. }));

        let mut buf = BytesMut::from(&b"POST / HTTP/1.1\r\nContent-Length: +3\r\n\r\n"[..]);
        let error = HeaderDecoder::new(8192).decode(&mut buf).unwrap_err();
        assert!(matches!(error, ParseError::InvalidContentLength { .. }));
    }

    #[test]
    fn rejects_malformed_start_line() {
        let mut buf = BytesMut::from(&b"GET / HTTP/2.0\r\n\r\n"[..]);
        assert!(HeaderDecoder::new(8192).decode(&mut buf).is_err());

        let mut buf = BytesMut::from(&b"G(T / HTTP/1.1\r\n\r\n"[..]);
        assert!(HeaderDecoder::new(8192).decode(&mut buf).is_err());
    }
}
