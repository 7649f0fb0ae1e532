use std::any::Any;
use std::error::Error;
use std::fmt::Display;
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use http::StatusCode;
use http_body::Body;
use tokio::io::{AsyncRead, AsyncWrite, split};
use tokio_util::task::TaskTracker;
use tracing::{Instrument, debug, error, info_span, warn};

use crate::connection::HttpConnection;
use crate::handler::{ErrorHandler, Handler};
use crate::protocol::Stage;
use crate::server::ServerConfig;

/// Runs the single exchange of one accepted connection.
///
/// Cloned once per connection; the clones share the handler and the
/// configuration read-only and nothing else.
pub(crate) struct Worker<H> {
    handler: Arc<H>,
    error_handler: Option<Arc<dyn ErrorHandler>>,
    config: Arc<ServerConfig>,
}

impl<H> Clone for Worker<H> {
    fn clone(&self) -> Self {
        Self { handler: Arc::clone(&self.handler), error_handler: self.error_handler.clone(), config: Arc::clone(&self.config) }
    }
}

impl<H> Worker<H>
where
    H: Handler + Send + Sync + 'static,
    H::RespBody: Send + Unpin,
    <H::RespBody as Body>::Data: Send,
    <H::RespBody as Body>::Error: Display + Send,
{
    pub(crate) fn new(handler: Arc<H>, error_handler: Option<Arc<dyn ErrorHandler>>, config: Arc<ServerConfig>) -> Self {
        Self { handler, error_handler, config }
    }

    /// Spawns the exchange on `tracker`. A panic inside the exchange is logged
    /// and the socket is dropped without a response; other workers and the
    /// accept loop are unaffected.
    pub(crate) fn spawn<S>(&self, tracker: &TaskTracker, stream: S, peer: SocketAddr)
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let worker = self.clone();
        let span = info_span!("connection", %peer);
        tracker.spawn(
            async move {
                if let Err(panic) = AssertUnwindSafe(worker.run(stream)).catch_unwind().await {
                    error!(cause = panic_message(&*panic), "worker panicked, connection dropped");
                }
            }
            .instrument(span),
        );
    }

    /// Reads the request, asks the handler, writes the answer and closes.
    ///
    /// Always ends with the connection closed and returns the last stage it
    /// reached before closing.
    pub(crate) async fn run<S>(&self, stream: S) -> Stage
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let (reader, writer) = split(stream);
        let mut connection = HttpConnection::new(reader, writer, &self.config);
        if let Some(error_handler) = &self.error_handler {
            connection = connection.with_error_handler(Arc::clone(error_handler));
        }

        let request = match connection.request().await {
            Ok(request) => request,
            Err(e) => {
                debug!(cause = %e, "connection ended without a request to answer");
                return connection.stage();
            }
        };

        let outcome = self.handler.call(request).await.map_err(Into::<Box<dyn Error + Send + Sync>>::into);
        if connection.is_closed() {
            debug!("peer left before the response was written");
            return Stage::Closed;
        }
        let result = match outcome {
            Ok(Some(response)) => connection.write_response(response).await,
            Ok(None) => {
                warn!("request was routed but no response was produced");
                connection.write_error(StatusCode::INTERNAL_SERVER_ERROR, "no response was produced for this request").await
            }
            Err(cause) => {
                error!(%cause, "handler failed");
                connection.write_error(StatusCode::INTERNAL_SERVER_ERROR, "the request handler failed").await
            }
        };

        let reached = connection.stage();
        if let Err(e) = result {
            warn!(cause = %e, "failed to answer request");
        }
        connection.close().await;
        reached
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::make_handler;
    use crate::protocol::SharedRequest;
    use bytes::Bytes;
    use http::Response;
    use http_body::Frame;
    use http_body_util::{Full, StreamBody};
    use std::convert::Infallible;
    use std::io;
    use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream, duplex};

    type TestResult = Result<Option<Response<Full<Bytes>>>, io::Error>;

    const GET: &[u8] = b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n";

    fn worker<H>(handler: H) -> Worker<H>
    where
        H: Handler + Send + Sync + 'static,
        H::RespBody: Send + Unpin,
        <H::RespBody as Body>::Data: Send,
        <H::RespBody as Body>::Error: Display + Send,
    {
        Worker::new(Arc::new(handler), None, Arc::new(ServerConfig::default()))
    }

    async fn client(request: &[u8]) -> (DuplexStream, DuplexStream) {
        let (mut client, server) = duplex(64 * 1024);
        client.write_all(request).await.unwrap();
        (client, server)
    }

    async fn response_text(client: &mut DuplexStream) -> String {
        let mut buf = Vec::new();
        client.read_to_end(&mut buf).await.unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[tokio::test]
    async fn handler_response_is_written() {
        let worker = worker(make_handler(|req: SharedRequest| async move {
            let body = format!("path={}", req.uri().path());
            Ok::<_, Infallible>(Some(Response::new(Full::new(Bytes::from(body)))))
        }));
        let (mut client, server) = client(GET).await;

        let reached = worker.run(server).await;

        assert_eq!(reached, Stage::ResponseWritten);
        let text = response_text(&mut client).await;
        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(text.ends_with("path=/"));
    }

    #[tokio::test]
    async fn missing_response_becomes_500() {
        let worker = worker(make_handler(|_req: SharedRequest| async { TestResult::Ok(None) }));
        let (mut client, server) = client(GET).await;

        let reached = worker.run(server).await;

        assert_eq!(reached, Stage::Closed);
        let text = response_text(&mut client).await;
        assert!(text.starts_with("HTTP/1.1 500 Internal Server Error\r\n"), "{text}");
        assert!(text.contains("no response was produced"));
    }

    #[tokio::test]
    async fn handler_error_becomes_500() {
        let worker = worker(make_handler(|_req: SharedRequest| async { TestResult::Err(io::Error::other("database down")) }));
        let (mut client, server) = client(GET).await;

        worker.run(server).await;

        let text = response_text(&mut client).await;
        assert!(text.starts_with("HTTP/1.1 500 Internal Server Error\r\n"));
        assert!(!text.contains("database down"));
    }

    #[tokio::test]
    async fn silent_client_gets_nothing() {
        let config = ServerConfig { read_timeout: std::time::Duration::from_millis(50), ..ServerConfig::default() };
        let handler = make_handler(|_req: SharedRequest| async { TestResult::Ok(None) });
        let worker = Worker::new(Arc::new(handler), None, Arc::new(config));
        let (mut client, server) = client(b"").await;

        let reached = worker.run(server).await;

        assert_eq!(reached, Stage::Closed);
        assert!(response_text(&mut client).await.is_empty());
    }

    #[tokio::test]
    async fn streamed_body_is_sent_chunked_from_spawned_worker() {
        let worker = worker(make_handler(|_req: SharedRequest| async {
            let frames = futures::stream::iter(["hello", " ", "world"].map(|part| Ok::<_, io::Error>(Frame::data(Bytes::from_static(part.as_bytes())))));
            Ok::<_, Infallible>(Some(Response::new(StreamBody::new(frames))))
        }));
        let tracker = TaskTracker::new();
        let (mut client, server) = client(GET).await;

        worker.spawn(&tracker, server, SocketAddr::from(([127, 0, 0, 1], 9)));
        tracker.close();
        tracker.wait().await;

        let text = response_text(&mut client).await;
        assert!(text.contains("transfer-encoding: chunked\r\n"), "{text}");
        assert!(text.ends_with("5\r\nhello\r\n1\r\n \r\n5\r\nworld\r\n0\r\n\r\n"), "{text}");
    }

    #[tokio::test]
    async fn peer_gone_before_response_gets_nothing() {
        let (release, released) = tokio::sync::oneshot::channel::<()>();
        let released = std::sync::Mutex::new(Some(released));
        let worker = worker(make_handler(move |_req: SharedRequest| {
            let released = released.lock().unwrap().take();
            async move {
                if let Some(released) = released {
                    let _ = released.await;
                }
                TestResult::Ok(Some(Response::new(Full::new(Bytes::from_static(b"too late")))))
            }
        }));
        let (client, server) = client(GET).await;

        let running = worker.run(server);
        let hang_up = async move {
            drop(client);
            let _ = release.send(());
        };
        let (reached, ()) = tokio::join!(running, hang_up);

        assert_eq!(reached, Stage::Closed);
    }

    #[tokio::test]
    async fn panicking_handler_only_drops_its_connection() {
        let worker = worker(make_handler(|req: SharedRequest| async move {
            if req.uri().path() == "/panic" {
                panic!("handler bug");
            }
            TestResult::Ok(Some(Response::new(Full::new(Bytes::from_static(b"fine")))))
        }));
        let tracker = TaskTracker::new();
        let peer = SocketAddr::from(([127, 0, 0, 1], 9));

        let (mut panicking, server) = client(b"GET /panic HTTP/1.1\r\n\r\n").await;
        worker.spawn(&tracker, server, peer);
        let (mut healthy, server) = client(GET).await;
        worker.spawn(&tracker, server, peer);

        tracker.close();
        tracker.wait().await;

        assert!(response_text(&mut panicking).await.is_empty());
        assert!(response_text(&mut healthy).await.ends_with("fine"));
    }
}
