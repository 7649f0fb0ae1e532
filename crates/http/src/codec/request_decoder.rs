//! Bounded request decoder.
//!
//! Decodes exactly one request: the head first, then its body, with every
//! byte counted against a single ceiling. The ceiling is checked against
//! what the client *claims* as well as what it has sent, so a large
//! `Content-Length` is rejected before any body buffer exists.
//!
//! # Example
//!
//! ```
//! use bytes::BytesMut;
//! use oneshot_http::codec::RequestDecoder;
//! use oneshot_http::protocol::ParseError;
//! use tokio_util::codec::Decoder;
//!
//! let mut decoder = RequestDecoder::new(64);
//! let mut buffer = BytesMut::from(&b"POST / HTTP/1.1\r\nContent-Length: 100\r\n\r\n"[..]);
//!
//! let error = decoder.decode(&mut buffer).err().unwrap();
//! assert!(matches!(error, ParseError::TooLargeRequest { .. }));
//! ```

use crate::codec::body::PayloadDecoder;
use crate::codec::header::HeaderDecoder;
use crate::ensure;
use crate::protocol::{Message, ParseError, PayloadItem, PayloadSize, RequestHeader};
use bytes::BytesMut;
use tokio_util::codec::Decoder;

/// Decoder for one request under a byte ceiling.
///
/// # State Machine
///
/// - `payload_decoder == None && !finished`: reading the head
/// - `payload_decoder == Some(_)`: reading the body
/// - `finished`: the request is complete, later bytes are left untouched
#[derive(Debug)]
pub struct RequestDecoder {
    header_decoder: HeaderDecoder,
    payload_decoder: Option<PayloadDecoder>,
    max_size: usize,
    finished: bool,
}

impl RequestDecoder {
    /// Creates a decoder that fails once a request needs more than `max_size` bytes.
    pub fn new(max_size: usize) -> Self {
        Self { header_decoder: HeaderDecoder::new(max_size), payload_decoder: None, max_size, finished: false }
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }
}

impl Decoder for RequestDecoder {
    type Item = Message<(RequestHeader, PayloadSize)>;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if self.finished {
            return Ok(None);
        }

        if let Some(payload_decoder) = &mut self.payload_decoder {
            let message = match payload_decoder.decode(src)? {
                Some(item @ PayloadItem::Chunk(_)) => Some(Message::Payload(item)),
                Some(item @ PayloadItem::Eof) => {
                    self.payload_decoder.take();
                    self.finished = true;
                    Some(Message::Payload(item))
                }
                None => None,
            };

            return Ok(message);
        }

        let Some((header, payload_size, head_len)) = self.header_decoder.decode(src)? else {
            return Ok(None);
        };

        let payload_decoder = match payload_size {
            PayloadSize::Length(length) => {
                let claimed = usize::try_from(length).unwrap_or(usize::MAX).saturating_add(head_len);
                ensure!(claimed <= self.max_size, ParseError::too_large_request(claimed, self.max_size));
                PayloadDecoder::fix_length(length)
            }
            PayloadSize::Chunked => PayloadDecoder::chunked(head_len, self.max_size),
            PayloadSize::Empty => PayloadDecoder::empty(),
        };
        self.payload_decoder = Some(payload_decoder);

        Ok(Some(Message::Header((header, payload_size))))
    }
}
