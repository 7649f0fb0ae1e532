use std::io;
use std::mem;
use std::net::SocketAddr;

use tokio::net::{TcpListener, TcpSocket, TcpStream, lookup_host};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::server::{SocketError, SocketErrorKind};

/// Cloneable trigger for stopping a [`Listener`] from outside the accept loop,
/// e.g. from a signal handler or a test.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    token: CancellationToken,
}

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.token.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Completes once [`stop`](Self::stop) was called on any clone.
    pub async fn stopped(&self) {
        self.token.cancelled().await
    }
}

enum State {
    Unbound(TcpSocket, SocketAddr),
    Bound(TcpSocket),
    Listening(TcpListener),
    Stopped,
}

impl State {
    fn name(&self) -> &'static str {
        match self {
            State::Unbound(..) => "unbound",
            State::Bound(_) => "bound",
            State::Listening(_) => "listening",
            State::Stopped => "stopped",
        }
    }
}

/// The server's listening TCP socket.
///
/// Moves through `unbound → bound → listening → stopped`, one operation per
/// step. Stopped is terminal: the socket is closed and never reused.
///
/// ```no_run
/// # async fn run() -> Result<(), oneshot_http::server::SocketError> {
/// use oneshot_http::server::Listener;
///
/// let mut listener = Listener::create("127.0.0.1", 8080).await?;
/// listener.bind()?;
/// listener.listen(5)?;
/// let (_stream, peer) = listener.accept().await?;
/// println!("accepted {peer}");
/// listener.stop();
/// # Ok(())
/// # }
/// ```
pub struct Listener {
    address: String,
    port: u16,
    state: State,
    stop: StopHandle,
}

impl std::fmt::Debug for Listener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listener")
            .field("address", &self.address)
            .field("port", &self.port)
            .field("state", &self.state.name())
            .finish()
    }
}

impl Listener {
    /// Resolves `address:port` and allocates a TCP socket for it with address
    /// reuse enabled.
    pub async fn create(address: impl Into<String>, port: u16) -> Result<Self, SocketError> {
        let address = address.into();
        let error = |e: io::Error| SocketError::new(SocketErrorKind::Create, address.as_str(), port, e);

        let socket_addr = lookup_host((address.as_str(), port))
            .await
            .map_err(error)?
            .next()
            .ok_or_else(|| error(io::Error::new(io::ErrorKind::InvalidInput, "address resolved to nothing")))?;

        let socket = if socket_addr.is_ipv4() { TcpSocket::new_v4() } else { TcpSocket::new_v6() }.map_err(error)?;
        socket.set_reuseaddr(true).map_err(error)?;

        debug!(%socket_addr, "created listener socket");
        Ok(Self { address, port, state: State::Unbound(socket, socket_addr), stop: StopHandle::new() })
    }

    /// Runs `create`, `bind` and `listen` in one go.
    pub async fn open(address: impl Into<String>, port: u16, backlog: u32) -> Result<Self, SocketError> {
        let mut listener = Self::create(address, port).await?;
        listener.bind()?;
        listener.listen(backlog)?;
        Ok(listener)
    }

    pub fn bind(&mut self) -> Result<(), SocketError> {
        match mem::replace(&mut self.state, State::Stopped) {
            State::Unbound(socket, socket_addr) => {
                if let Err(e) = socket.bind(socket_addr) {
                    self.state = State::Unbound(socket, socket_addr);
                    return Err(self.error(SocketErrorKind::Bind, e));
                }
                self.state = State::Bound(socket);
                Ok(())
            }
            state => {
                self.state = state;
                Err(self.wrong_state(SocketErrorKind::Bind))
            }
        }
    }

    pub fn listen(&mut self, backlog: u32) -> Result<(), SocketError> {
        match mem::replace(&mut self.state, State::Stopped) {
            // a socket that failed to listen is unusable, it stays stopped
            State::Bound(socket) => {
                let listener = socket.listen(backlog).map_err(|e| self.error(SocketErrorKind::Listen, e))?;
                match listener.local_addr() {
                    Ok(local_addr) => info!(%local_addr, backlog, "listening"),
                    Err(e) => debug!(cause = %e, "listening on unknown local address"),
                }
                self.state = State::Listening(listener);
                Ok(())
            }
            state => {
                self.state = state;
                Err(self.wrong_state(SocketErrorKind::Listen))
            }
        }
    }

    /// Waits for the next client.
    ///
    /// A failure here concerns one connection only; the listener keeps listening.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr), SocketError> {
        match &self.state {
            State::Listening(listener) if !self.stop.is_stopped() => {
                listener.accept().await.map_err(|e| self.error(SocketErrorKind::Accept, e))
            }
            _ => Err(self.wrong_state(SocketErrorKind::Accept)),
        }
    }

    /// Closes the socket. Idempotent.
    pub fn stop(&mut self) {
        self.stop.stop();
        if !matches!(self.state, State::Stopped) {
            self.state = State::Stopped;
            info!(address = %self.address, port = self.port, "listener stopped");
        }
    }

    pub fn is_listening(&self) -> bool {
        matches!(self.state, State::Listening(_)) && !self.stop.is_stopped()
    }

    /// The address the socket is bound to; resolves port `0` to the real port.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        match &self.state {
            State::Bound(socket) => socket.local_addr().ok(),
            State::Listening(listener) => listener.local_addr().ok(),
            State::Unbound(..) | State::Stopped => None,
        }
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    fn error(&self, kind: SocketErrorKind, source: io::Error) -> SocketError {
        SocketError::new(kind, self.address.as_str(), self.port, source)
    }

    fn wrong_state(&self, kind: SocketErrorKind) -> SocketError {
        let state = if self.stop.is_stopped() { "stopped" } else { self.state.name() };
        let source = io::Error::other(format!("listener is {state}"));
        self.error(kind, source)
    }
}
