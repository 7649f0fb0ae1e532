//! The boundary between the connection and whatever answers requests.
//!
//! - [`Handler`]: turns a read request into a response, or into nothing
//! - [`ErrorHandler`]: renders the error responses the server synthesizes

use std::error::Error;
use std::fmt;

use http::Response;
use http_body::Body;

use crate::protocol::SharedRequest;

mod error_handler;

pub use error_handler::{ErrorHandler, default_error_response};

/// Answers one request.
///
/// Returning `Ok(None)` means the request was routed but nobody produced a
/// response; the connection answers `500 Internal Server Error` in that case,
/// as it does for `Err`.
#[trait_variant::make(Send)]
pub trait Handler {
    type RespBody: Body;
    type Error: Into<Box<dyn Error + Send + Sync>>;

    async fn call(&self, req: SharedRequest) -> Result<Option<Response<Self::RespBody>>, Self::Error>;
}

/// A [`Handler`] backed by an async function, see [`make_handler`].
pub struct HandlerFn<F> {
    f: F,
}

impl<F> fmt::Debug for HandlerFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerFn").finish_non_exhaustive()
    }
}

impl<RespBody, Err, F, Fut> Handler for HandlerFn<F>
where
    RespBody: Body,
    F: Fn(SharedRequest) -> Fut + Send + Sync,
    Err: Into<Box<dyn Error + Send + Sync>>,
    Fut: Future<Output = Result<Option<Response<RespBody>>, Err>> + Send,
{
    type RespBody = RespBody;
    type Error = Err;

    fn call(&self, req: SharedRequest) -> impl Future<Output = Result<Option<Response<Self::RespBody>>, Self::Error>> + Send {
        (self.f)(req)
    }
}

/// Wraps an async function into a [`Handler`].
///
/// ```
/// use bytes::Bytes;
/// use http::Response;
/// use http_body_util::Full;
/// use oneshot_http::handler::make_handler;
/// use oneshot_http::protocol::SharedRequest;
/// use std::convert::Infallible;
///
/// async fn hello(req: SharedRequest) -> Result<Option<Response<Full<Bytes>>>, Infallible> {
///     let body = format!("hello from {}\n", req.uri().path());
///     Ok(Some(Response::new(Full::new(Bytes::from(body)))))
/// }
///
/// let handler = make_handler(hello);
/// # let _ = handler;
/// ```
pub fn make_handler<F, RespBody, Err, Ret>(f: F) -> HandlerFn<F>
where
    RespBody: Body,
    Err: Into<Box<dyn Error + Send + Sync>>,
    Ret: Future<Output = Result<Option<Response<RespBody>>, Err>>,
    F: Fn(SharedRequest) -> Ret,
{
    HandlerFn { f }
}
