//! Decoder for `Transfer-Encoding: chunked` request bodies.
//!
//! Every wire byte the decoder consumes, framing included, counts against the
//! request size ceiling. A chunk whose declared size would cross the ceiling
//! is rejected as soon as its size line is read, before any of its data.

use bytes::BytesMut;
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::ensure;
use crate::protocol::{ParseError, PayloadItem};

/// Longest size or trailer line accepted, extensions included.
const MAX_LINE_BYTES: usize = 4096;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkedDecoder {
    state: ChunkedState,
    /// Data bytes left in the current chunk
    remaining: u64,
    /// Request bytes consumed so far, head included
    consumed: usize,
    max_size: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChunkedState {
    /// Read `<hex size>[;extensions]` up to LF
    Size,
    /// Read chunk data
    Data,
    /// Read the line break that ends chunk data
    DataEnd,
    /// Skip trailer fields until an empty line
    Trailer,
    End,
}

impl ChunkedDecoder {
    /// `consumed` is what the request head already used of `max_size`.
    pub fn new(consumed: usize, max_size: usize) -> Self {
        Self { state: ChunkedState::Size, remaining: 0, consumed, max_size }
    }

    fn count(&mut self, n: usize) -> Result<(), ParseError> {
        self.consumed = self.consumed.saturating_add(n);
        ensure!(self.consumed <= self.max_size, ParseError::too_large_request(self.consumed, self.max_size));
        Ok(())
    }

    /// Takes one line off `src` without its line break; CR is optional.
    fn take_line(&mut self, src: &mut BytesMut) -> Result<Option<BytesMut>, ParseError> {
        let Some(pos) = src.iter().position(|b| *b == b'\n') else {
            let pending = self.consumed.saturating_add(src.len());
            ensure!(pending <= self.max_size, ParseError::too_large_request(pending, self.max_size));
            ensure!(src.len() <= MAX_LINE_BYTES, ParseError::invalid_body("chunk line too long"));
            return Ok(None);
        };

        ensure!(pos <= MAX_LINE_BYTES, ParseError::invalid_body("chunk line too long"));
        self.count(pos + 1)?;

        let mut line = src.split_to(pos + 1);
        line.truncate(pos);
        if line.last() == Some(&b'\r') {
            line.truncate(pos - 1);
        }
        Ok(Some(line))
    }
}

impl Decoder for ChunkedDecoder {
    type Item = PayloadItem;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            match self.state {
                ChunkedState::Size => {
                    let Some(line) = self.take_line(src)? else { return Ok(None) };
                    let size = parse_chunk_size(&line)?;
                    trace!(size, "read chunk size");

                    if size == 0 {
                        self.state = ChunkedState::Trailer;
                        continue;
                    }

                    let claimed = usize::try_from(size).unwrap_or(usize::MAX).saturating_add(self.consumed);
                    ensure!(claimed <= self.max_size, ParseError::too_large_request(claimed, self.max_size));

                    self.remaining = size;
                    self.state = ChunkedState::Data;
                }

                ChunkedState::Data => {
                    if src.is_empty() {
                        return Ok(None);
                    }

                    #[allow(clippy::cast_possible_truncation, reason = "the minimum is bounded by src.len()")]
                    let len = self.remaining.min(src.len() as u64) as usize;
                    self.count(len)?;
                    let bytes = src.split_to(len).freeze();

                    self.remaining -= len as u64;
                    if self.remaining == 0 {
                        self.state = ChunkedState::DataEnd;
                    }
                    return Ok(Some(PayloadItem::Chunk(bytes)));
                }

                ChunkedState::DataEnd => {
                    let Some(line) = self.take_line(src)? else { return Ok(None) };
                    ensure!(line.is_empty(), ParseError::invalid_body("missing line break after chunk data"));
                    self.state = ChunkedState::Size;
                }

                ChunkedState::Trailer => {
                    let Some(line) = self.take_line(src)? else { return Ok(None) };
                    if line.is_empty() {
                        self.state = ChunkedState::End;
                    }
                }

                ChunkedState::End => {
                    trace!("finished reading chunked data");
                    return Ok(Some(PayloadItem::Eof));
                }
            }
        }
    }
}

/// Parses the hex size in front of any `;extension`.
fn parse_chunk_size(line: &[u8]) -> Result<u64, ParseError> {
    let size = line.split(|b| *b == b';').next().unwrap_or_default().trim_ascii();

    ensure!(
        !size.is_empty() && size.len() <= 16 && size.iter().all(u8::is_ascii_hexdigit),
        ParseError::invalid_body("invalid chunk size")
    );

    size.iter().try_fold(0u64, |acc, b| {
        let digit = char::from(*b).to_digit(16).ok_or_else(|| ParseError::invalid_body("invalid chunk size"))?;
        Ok(acc << 4 | u64::from(digit))
    })
}
