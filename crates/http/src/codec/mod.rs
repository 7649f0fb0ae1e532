//! Wire codecs for the single exchange a connection carries.
//!
//! - Request side:
//!   - [`RequestDecoder`]: bounded, incremental decoding of one request
//!   - head parsing via the `header` module, body framing via the `body` module
//!
//! - Response side:
//!   - [`ResponseEncoder`]: status line, framing headers and body encoding
//!
//! Both plug into `tokio_util::codec::{FramedRead, FramedWrite}`.

mod body;
mod header;
mod request_decoder;
mod response_encoder;

pub use request_decoder::RequestDecoder;
pub use response_encoder::ResponseEncoder;
