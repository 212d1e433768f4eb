//! Server side of a session.
//!
//! Binds, accepts exactly one peer, then echoes every line back upper-cased
//! until the peer goes away.

use crate::keepalive::KeepaliveConfig;
use crate::observer::{SessionEvent, SessionObserver};
use crate::protocol::{self, strip_terminator};
use crate::session::{configure_keepalive, SessionError};
use std::convert::Infallible;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{lookup_host, TcpListener};

/// Listen backlog. Only the first queued peer is ever served.
const LISTEN_BACKLOG: i32 = 128;

/// Initial capacity for the line buffer.
const LINE_CAPACITY: usize = 1024;

/// A bound server waiting for its single peer.
pub struct Server {
    listener: TcpListener,
    keepalive: KeepaliveConfig,
}

impl Server {
    /// Bind and listen on `address:port`. No retry on failure.
    pub async fn bind(
        address: &str,
        port: u16,
        keepalive: KeepaliveConfig,
    ) -> Result<Self, SessionError> {
        let display = format!("{address}:{port}");

        let addr = lookup_host((address, port))
            .await
            .map_err(|source| SessionError::Resolve {
                addr: display.clone(),
                source,
            })?
            .next()
            .ok_or_else(|| SessionError::Resolve {
                addr: display.clone(),
                source: io::Error::new(io::ErrorKind::NotFound, "no addresses found"),
            })?;

        let listener = create_listener(addr).map_err(|source| SessionError::Bind {
            addr: display,
            source,
        })?;

        Ok(Server {
            listener,
            keepalive,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept one connection and serve it until it fails.
    ///
    /// The listener is closed once the peer is accepted. The session never
    /// ends normally: the peer disconnecting is reported as an error.
    pub async fn serve_one(
        self,
        observer: Arc<dyn SessionObserver>,
    ) -> Result<Infallible, SessionError> {
        let addr = self.local_addr()?;
        observer.notify(SessionEvent::Listening { addr });

        let (stream, peer) = self.listener.accept().await.map_err(SessionError::Accept)?;
        drop(self.listener);
        observer.notify(SessionEvent::Accepted { peer });

        configure_keepalive(&stream, &self.keepalive, observer.as_ref());

        serve_lines(stream, observer.as_ref()).await
    }
}

/// Echo loop: one line in, one upper-cased line out.
pub(crate) async fn serve_lines<S>(
    stream: S,
    observer: &dyn SessionObserver,
) -> Result<Infallible, SessionError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (reader, mut writer) = tokio::io::split(stream);
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::with_capacity(LINE_CAPACITY);

    loop {
        let Some(line) = protocol::read_line(&mut reader, &mut buf).await? else {
            return Err(SessionError::PeerClosed);
        };

        let response = protocol::reply(&line);
        observer.notify(SessionEvent::LineReceived(line));
        writer.write_all(&response).await?;
        observer.notify(SessionEvent::LineSent(
            strip_terminator(&String::from_utf8_lossy(&response)).to_string(),
        ));
    }
}

/// Create a TCP listener with SO_REUSEADDR so restarts don't wait out TIME_WAIT.
fn create_listener(addr: SocketAddr) -> io::Result<TcpListener> {
    let socket = socket2::Socket::new(
        match addr {
            SocketAddr::V4(_) => socket2::Domain::IPV4,
            SocketAddr::V6(_) => socket2::Domain::IPV6,
        },
        socket2::Type::STREAM,
        Some(socket2::Protocol::TCP),
    )?;

    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(LISTEN_BACKLOG)?;

    TcpListener::from_std(socket.into())
}
