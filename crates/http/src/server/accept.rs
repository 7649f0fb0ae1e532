use std::net::SocketAddr;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::{debug, warn};

use crate::server::{Listener, SocketError, StopHandle};

/// A source of accepted connections for the accept loop.
///
/// [`Listener`] is the production implementation; tests drive the loop with
/// scripted acceptors.
#[trait_variant::make(Send)]
pub trait Accept {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    async fn accept(&mut self) -> Result<(Self::Stream, SocketAddr), SocketError>;

    /// Stops accepting for good.
    fn stop(&mut self);
}

impl Accept for Listener {
    type Stream = TcpStream;

    async fn accept(&mut self) -> Result<(TcpStream, SocketAddr), SocketError> {
        Listener::accept(self).await
    }

    fn stop(&mut self) {
        Listener::stop(self)
    }
}

/// Accepts until `stop` fires, handing every connection to `on_accept`.
///
/// Accept failures are logged and skipped. Returns the number of connections
/// handed out.
pub(crate) async fn accept_loop<A, F>(acceptor: &mut A, stop: &StopHandle, mut on_accept: F) -> usize
where
    A: Accept,
    F: FnMut(A::Stream, SocketAddr),
{
    let mut accepted = 0;
    loop {
        let result = tokio::select! {
            biased;
            _ = stop.stopped() => break,
            result = acceptor.accept() => result,
        };

        match result {
            Ok((stream, peer)) => {
                debug!(%peer, "accepted connection");
                accepted += 1;
                on_accept(stream, peer);
            }
            Err(e) => warn!(cause = %e, "failed to accept"),
        }
    }
    accepted
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::server::SocketErrorKind;
    use proptest::prelude::*;
    use std::collections::VecDeque;
    use std::io;
    use tokio::io::{AsyncWriteExt, DuplexStream, duplex};

    /// Replays a fixed script of accept outcomes and stops once it runs dry.
    /// Every accepted client has already sent a `GET /` request.
    pub(crate) struct ScriptedAcceptor {
        script: VecDeque<bool>,
        stop: StopHandle,
        pub(crate) calls: usize,
        pub(crate) clients: Vec<DuplexStream>,
        port: u16,
    }

    impl ScriptedAcceptor {
        pub(crate) fn new(script: impl IntoIterator<Item = bool>, stop: StopHandle) -> Self {
            Self { script: script.into_iter().collect(), stop, calls: 0, clients: Vec::new(), port: 0 }
        }
    }

    impl Accept for ScriptedAcceptor {
        type Stream = DuplexStream;

        async fn accept(&mut self) -> Result<(DuplexStream, SocketAddr), SocketError> {
            let Some(succeed) = self.script.pop_front() else {
                return std::future::pending().await;
            };
            self.calls += 1;
            if self.script.is_empty() {
                self.stop.stop();
            }

            self.port += 1;
            if succeed {
                let (mut client, server) = duplex(4096);
                client.write_all(b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n").await.unwrap();
                self.clients.push(client);
                Ok((server, SocketAddr::from(([127, 0, 0, 1], self.port))))
            } else {
                let source = io::Error::from(io::ErrorKind::ConnectionAborted);
                Err(SocketError::new(SocketErrorKind::Accept, "127.0.0.1", 0, source))
            }
        }

        fn stop(&mut self) {
            self.stop.stop();
        }
    }

    #[tokio::test]
    async fn failed_accepts_do_not_stop_the_loop() {
        let stop = StopHandle::new();
        let mut acceptor = ScriptedAcceptor::new([false, true, false, false, true], stop.clone());
        let mut peers = Vec::new();

        let accepted = accept_loop(&mut acceptor, &stop, |_stream, peer| peers.push(peer.port())).await;

        assert_eq!(accepted, 2);
        assert_eq!(peers, vec![2, 5]);
        assert_eq!(acceptor.calls, 5);
    }

    #[tokio::test]
    async fn stopped_loop_does_not_accept() {
        let stop = StopHandle::new();
        stop.stop();
        let mut acceptor = ScriptedAcceptor::new([true, true], stop.clone());

        let accepted = accept_loop(&mut acceptor, &stop, |_, _| {}).await;

        assert_eq!(accepted, 0);
        assert_eq!(acceptor.calls, 0);
    }

    proptest! {
        #[test]
        fn every_successful_accept_is_handled(script in proptest::collection::vec(any::<bool>(), 1..32)) {
            let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
            let successes = script.iter().filter(|ok| **ok).count();
            let attempts = script.len();

            let (accepted, handled, calls) = runtime.block_on(async {
                let stop = StopHandle::new();
                let mut acceptor = ScriptedAcceptor::new(script, stop.clone());
                let mut handled = 0;
                let accepted = accept_loop(&mut acceptor, &stop, |_, _| handled += 1).await;
                (accepted, handled, acceptor.calls)
            });

            prop_assert_eq!(accepted, successes);
            prop_assert_eq!(handled, successes);
            prop_assert_eq!(calls, attempts);
        }
    }
}
