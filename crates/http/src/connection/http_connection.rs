use std::fmt;
use std::fmt::Display;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use futures::task::noop_waker_ref;
use futures::{SinkExt, StreamExt};
use http::{Response, StatusCode};
use http_body::Body;
use http_body_util::BodyExt;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio::time::timeout;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, error, trace, warn};

use crate::codec::{RequestDecoder, ResponseEncoder};
use crate::handler::{ErrorHandler, default_error_response};
use crate::protocol::{
    HttpError, Message, ParseError, PayloadItem, PayloadSize, RequestHeader, ResponseHead, SendError, SharedRequest, Stage,
    reason_phrase,
};
use crate::server::ServerConfig;

/// Upper bounds for draining unread input after rejecting a request.
const LINGER_TIMEOUT: Duration = Duration::from_secs(1);
const LINGER_MAX_BYTES: usize = 64 * 1024;

type RequestMessage = Message<(RequestHeader, PayloadSize)>;
type ResponseMessage<D> = Message<(ResponseHead, PayloadSize), D>;

/// One accepted client connection carrying exactly one request/response exchange.
///
/// The connection walks the stages `Accepted → RequestRead → ResponseWritten → Closed`
/// and never goes back. Every public operation checks the current stage:
///
/// - [`request`](Self::request) reads and caches the request (`Accepted`), or
///   returns the cached one afterwards
/// - [`write_response`](Self::write_response) is only valid in `RequestRead`, so a
///   response can neither precede the request nor be written twice
/// - [`close`](Self::close) is valid anywhere and idempotent
///
/// Errors the client caused are answered before closing: an oversized request with
/// `413 Request Entity Too Large`, a malformed one with `400 Bad Request`. A client that
/// goes silent past the read timeout, or disconnects, gets nothing.
///
/// # Type Parameters
///
/// * `R`: The async readable half of the socket
/// * `W`: The async writable half of the socket
pub struct HttpConnection<R, W> {
    framed_read: FramedRead<R, RequestDecoder>,
    framed_write: FramedWrite<W, ResponseEncoder>,
    stage: Stage,
    request: Option<SharedRequest>,
    head_only: bool,
    read_timeout: Duration,
    error_handler: Option<Arc<dyn ErrorHandler>>,
}

impl<R, W> fmt::Debug for HttpConnection<R, W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpConnection")
            .field("stage", &self.stage)
            .field("max_request_size", &self.framed_read.decoder().max_size())
            .field("read_timeout", &self.read_timeout)
            .field("has_request", &self.request.is_some())
            .finish_non_exhaustive()
    }
}

impl<R, W> HttpConnection<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W, config: &ServerConfig) -> Self {
        let read_capacity = config.max_request_size.min(8 * 1024);
        Self {
            framed_read: FramedRead::with_capacity(reader, RequestDecoder::new(config.max_request_size), read_capacity),
            framed_write: FramedWrite::new(writer, ResponseEncoder::new()),
            stage: Stage::Accepted,
            request: None,
            head_only: false,
            read_timeout: config.read_timeout,
            error_handler: None,
        }
    }

    /// Renders synthesized error responses with `error_handler` instead of the default page.
    pub fn with_error_handler(mut self, error_handler: Arc<dyn ErrorHandler>) -> Self {
        self.error_handler = Some(error_handler);
        self
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// True once the connection reached [`Stage::Closed`], whether through
    /// [`close`](Self::close) or because reading hit a timeout, EOF or a
    /// transport error.
    ///
    /// Once the request was read, also checks the socket without waiting: a
    /// peer that has hung up (EOF or a read error) moves the connection to
    /// `Closed` right away. Before that the read path itself detects it.
    pub fn is_closed(&mut self) -> bool {
        let request_read = matches!(self.stage, Stage::RequestRead | Stage::ResponseWritten);
        if request_read && self.peer_gone() {
            debug!(stage = %self.stage, "peer went away");
            self.advance(Stage::Closed);
        }
        self.stage.is_closed()
    }

    /// Returns the request, reading it from the socket on first use.
    ///
    /// The request is parsed at most once; later calls hand out the same cached
    /// value. When parsing fails the connection answers if the client deserves an
    /// answer (413 or 400), closes, and returns the error.
    ///
    /// # Errors
    ///
    /// - [`HttpError::RequestError`] if no valid request could be read
    /// - [`HttpError::StageViolation`] if the connection closed before any request was read
    pub async fn request(&mut self) -> Result<SharedRequest, HttpError> {
        if let Some(request) = &self.request {
            return Ok(SharedRequest::clone(request));
        }

        if self.stage != Stage::Accepted {
            return Err(self.stage_violation("request"));
        }

        match self.read_request().await {
            Ok(request) => {
                let request = SharedRequest::new(request);
                self.request = Some(SharedRequest::clone(&request));
                self.advance(Stage::RequestRead);
                Ok(request)
            }
            Err(e) => {
                match e.response_status() {
                    Some(status) => {
                        warn!(cause = %e, status = status.as_u16(), "rejecting request");
                        if let Err(send_error) = self.send_error(status, &e.to_string()).await {
                            warn!(cause = %send_error, "failed to send error response");
                        }
                        // unread input at close turns the FIN into a reset, which can
                        // destroy the error response before the client reads it
                        self.shutdown().await;
                        self.linger().await;
                        self.advance(Stage::Closed);
                    }
                    None => {
                        debug!(cause = %e, "no request received");
                        self.close().await;
                    }
                }
                Err(e.into())
            }
        }
    }

    /// Writes the response to the request read earlier.
    ///
    /// A response to a `HEAD` request is written without its body.
    ///
    /// # Errors
    ///
    /// - [`HttpError::StageViolation`] unless the stage is `RequestRead`; the stage is left as it was
    /// - [`HttpError::ResponseError`] if writing failed; the connection is closed
    pub async fn write_response<B>(&mut self, response: Response<B>) -> Result<(), HttpError>
    where
        B: Body + Unpin,
        B::Error: Display,
    {
        if self.stage != Stage::RequestRead {
            return Err(self.stage_violation("write_response"));
        }

        let head_only = self.head_only;
        match self.send_response(response, head_only).await {
            Ok(()) => {
                self.advance(Stage::ResponseWritten);
                Ok(())
            }
            Err(e) => {
                error!(cause = %e, "failed to write response");
                self.close().await;
                Err(e.into())
            }
        }
    }

    /// Answers with a synthesized error response and closes the connection.
    ///
    /// Valid before any response was written, i.e. in `Accepted` or `RequestRead`.
    ///
    /// # Errors
    ///
    /// - [`HttpError::StageViolation`] once a response was written or the connection closed
    /// - [`HttpError::ResponseError`] if writing failed
    pub async fn write_error(&mut self, status: StatusCode, message: &str) -> Result<(), HttpError> {
        if self.stage >= Stage::ResponseWritten {
            return Err(self.stage_violation("write_error"));
        }

        let result = self.send_error(status, message).await;
        self.close().await;
        Ok(result?)
    }

    /// Shuts the socket down and moves to [`Stage::Closed`]. Safe to call in
    /// any stage and any number of times.
    pub async fn close(&mut self) {
        if self.stage.is_closed() {
            return;
        }

        self.shutdown().await;
        self.advance(Stage::Closed);
    }

    async fn shutdown(&mut self) {
        if let Err(e) = self.framed_write.get_mut().shutdown().await {
            debug!(cause = %e, "socket shutdown failed");
        }
    }

    fn peer_gone(&mut self) -> bool {
        let mut cx = Context::from_waker(noop_waker_ref());
        let mut scratch = [0u8; 512];
        let mut buf = ReadBuf::new(&mut scratch);

        match Pin::new(self.framed_read.get_mut()).poll_read(&mut cx, &mut buf) {
            Poll::Pending => false,
            Poll::Ready(Ok(())) if buf.filled().is_empty() => true,
            Poll::Ready(Ok(())) => {
                // input past the single request is never decoded
                trace!(ignored = buf.filled().len(), "ignored bytes after the request");
                false
            }
            Poll::Ready(Err(e)) => {
                trace!(cause = %e, "read error while checking the peer");
                true
            }
        }
    }

    async fn linger(&mut self) {
        let limit = LINGER_TIMEOUT.min(self.read_timeout);
        let reader = self.framed_read.get_mut();
        let drain = async move {
            let mut scratch = [0u8; 4096];
            let mut drained = 0;
            while drained < LINGER_MAX_BYTES {
                match reader.read(&mut scratch).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => drained += n,
                }
            }
            drained
        };

        match timeout(limit, drain).await {
            Ok(drained) => trace!(drained, "drained unread input"),
            Err(_) => trace!("stopped draining unread input"),
        }
    }

    async fn read_request(&mut self) -> Result<http::Request<Bytes>, ParseError> {
        let (header, payload_size) = match self.next_message().await? {
            Some(Message::Header(header)) => header,
            Some(Message::Payload(_)) => return Err(ParseError::invalid_body("need header while receive body")),
            None => return Err(ParseError::ConnectionClosed),
        };

        // the declared length already passed the size ceiling
        let capacity = match payload_size {
            PayloadSize::Length(length) => usize::try_from(length).unwrap_or_default(),
            PayloadSize::Chunked | PayloadSize::Empty => 0,
        };
        let mut body = BytesMut::with_capacity(capacity);

        loop {
            match self.next_message().await? {
                Some(Message::Payload(PayloadItem::Chunk(bytes))) => body.extend_from_slice(&bytes),
                Some(Message::Payload(PayloadItem::Eof)) => break,
                Some(Message::Header(_)) => return Err(ParseError::invalid_body("received a header inside the body")),
                None => return Err(ParseError::ConnectionClosed),
            }
        }

        trace!(method = %header.method(), uri = %header.uri(), body_size = body.len(), "read request");
        self.head_only = header.is_head();
        Ok(header.body(body.freeze()))
    }

    async fn next_message(&mut self) -> Result<Option<RequestMessage>, ParseError> {
        match timeout(self.read_timeout, self.framed_read.next()).await {
            Ok(Some(result)) => result.map(Some),
            Ok(None) => Ok(None),
            Err(_) => Err(ParseError::Timeout { timeout: self.read_timeout }),
        }
    }

    async fn send_error(&mut self, status: StatusCode, message: &str) -> Result<(), SendError> {
        let reason = reason_phrase(status);
        let mut response = match &self.error_handler {
            Some(error_handler) => error_handler.error_response(status, reason, message),
            None => default_error_response(status, reason, message),
        };
        // the error handler renders the body, the status is not its to change
        *response.status_mut() = status;
        self.send_response(response, false).await
    }

    async fn send_response<B>(&mut self, response: Response<B>, head_only: bool) -> Result<(), SendError>
    where
        B: Body + Unpin,
        B::Error: Display,
    {
        let (header_parts, mut body) = response.into_parts();
        let payload_size = PayloadSize::from_size_hint(&body.size_hint());
        let header = ResponseMessage::<B::Data>::Header((ResponseHead::from_parts(header_parts, ()), payload_size));

        if head_only || payload_size.is_empty() {
            // a head without body has to reach the socket right away
            self.framed_write.send(header).await?;
            self.framed_write.encoder_mut().skip_payload();
            return Ok(());
        }

        self.framed_write.feed(header).await?;

        loop {
            let frame = match body.frame().await {
                Some(Ok(frame)) => frame,
                Some(Err(e)) => return Err(SendError::invalid_body(format!("resolve response body error: {e}"))),
                None => return self.framed_write.send(ResponseMessage::<B::Data>::Payload(PayloadItem::Eof)).await,
            };

            // trailers have no place in a close-delimited exchange
            if let Ok(data) = frame.into_data() {
                self.framed_write.feed(ResponseMessage::Payload(PayloadItem::Chunk(data))).await?;
            }
        }
    }

    fn advance(&mut self, next: Stage) {
        debug_assert!(self.stage.can_advance_to(next), "stage must move forward: {} -> {}", self.stage, next);
        trace!(from = %self.stage, to = %next, "connection stage");
        self.stage = next;
    }

    fn stage_violation(&self, operation: &'static str) -> HttpError {
        error!(operation, stage = %self.stage, "connection operation called in the wrong stage");
        HttpError::stage_violation(operation, self.stage)
    }
}
