//! Request head decoding and response head encoding.
//!
//! - [`HeaderDecoder`]: parses the start-line and headers, enforcing the size ceiling
//! - [`HeaderEncoder`]: writes the status line, framing headers and header block

mod header_decoder;
mod header_encoder;

pub use header_decoder::HeaderDecoder;
pub use header_encoder::HeaderEncoder;
