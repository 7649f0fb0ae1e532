//! Body framing for requests (decoding) and responses (encoding).
//!
//! ## Decoders
//! - [`PayloadDecoder`]: picks `Content-Length`, chunked or no-body decoding
//!
//! ## Encoders
//! - [`PayloadEncoder`]: picks `Content-Length`, chunked or no-body encoding

mod chunked_decoder;
mod chunked_encoder;
mod length_decoder;
mod length_encoder;
mod payload_decoder;
mod payload_encoder;

pub use payload_decoder::PayloadDecoder;
pub use payload_encoder::PayloadEncoder;
