//! Protocol types shared by the codec and the connection.
//!
//! - **Message Handling** ([`Message`], [`PayloadItem`], [`PayloadSize`]):
//!   what the codec produces and consumes
//! - **Request** ([`RequestHeader`], [`SharedRequest`]): the parsed request
//!   head and the cached, read-only request handed to handlers
//! - **Response** ([`ResponseHead`], [`ReasonPhrase`], [`reason_phrase`]):
//!   response head and status-line wording
//! - **Lifecycle** ([`Stage`]): the forward-only connection stage
//! - **Error Handling** ([`HttpError`], [`ParseError`], [`SendError`])

use bytes::Bytes;

mod message;
pub use message::Message;
pub use message::PayloadItem;
pub use message::PayloadSize;

mod request;
pub use request::RequestHeader;

mod response;
pub use response::ReasonPhrase;
pub use response::ResponseHead;

mod status;
pub use status::reason_phrase;

mod stage;
pub use stage::Stage;

mod error;
pub use error::HttpError;
pub use error::ParseError;
pub use error::SendError;

/// A fully read request, shared read-only between the connection that owns it
/// and the handler answering it.
pub type SharedRequest = triomphe::Arc<http::Request<Bytes>>;
