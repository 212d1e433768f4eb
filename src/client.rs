//! Client side of a session.
//!
//! Dials the server, then sends one framed line at a time from its message
//! source and waits for the single reply before asking for the next.

use crate::keepalive::KeepaliveConfig;
use crate::observer::{SessionEvent, SessionObserver};
use crate::protocol::{self, strip_terminator};
use crate::session::{configure_keepalive, SessionError, SessionOutcome, SourceKind};
use crate::source::{MessageSource, SourceHandle};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

/// Run a client session with the source selected by `kind`.
///
/// Scripted specs are parsed before dialing.
pub async fn run(
    address: &str,
    port: u16,
    keepalive: KeepaliveConfig,
    kind: SourceKind,
    observer: Arc<dyn SessionObserver>,
) -> Result<SessionOutcome, SessionError> {
    let source = match kind {
        SourceKind::Interactive => MessageSource::stdin(),
        SourceKind::Scripted(spec) => MessageSource::scripted(&spec)?,
    };

    run_with_source(address, port, keepalive, source, observer).await
}

/// Run a client session fed by an already-built source.
pub async fn run_with_source(
    address: &str,
    port: u16,
    keepalive: KeepaliveConfig,
    source: MessageSource,
    observer: Arc<dyn SessionObserver>,
) -> Result<SessionOutcome, SessionError> {
    let stream = TcpStream::connect((address, port))
        .await
        .map_err(|source| SessionError::Connect {
            addr: format!("{address}:{port}"),
            source,
        })?;
    observer.notify(SessionEvent::Connected {
        peer: stream.peer_addr()?,
    });

    configure_keepalive(&stream, &keepalive, observer.as_ref());

    let mut handle = source.spawn(Arc::clone(&observer));
    exchange(stream, &mut handle, observer.as_ref()).await
}

/// Request/reply loop. Exactly one line is in flight at a time.
pub(crate) async fn exchange<S>(
    stream: S,
    source: &mut SourceHandle,
    observer: &dyn SessionObserver,
) -> Result<SessionOutcome, SessionError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (reader, mut writer) = tokio::io::split(stream);
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();

    while let Some(text) = source.next().await? {
        let frame = protocol::frame_now(&text);
        writer.write_all(&frame).await?;
        observer.notify(SessionEvent::LineSent(
            strip_terminator(&String::from_utf8_lossy(&frame)).to_string(),
        ));

        let Some(reply) = protocol::read_line(&mut reader, &mut buf).await? else {
            return Err(SessionError::PeerClosed);
        };
        observer.notify(SessionEvent::LineReceived(reply));
    }

    observer.notify(SessionEvent::Completed);
    Ok(SessionOutcome::Completed)
}
