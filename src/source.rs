//! Outbound message sources for the client.
//!
//! A source runs as a background producer task and hands lines to the
//! session through a single-slot channel, so at most one outbound line is
//! pending at any time. Completion is an explicit `Outbound::End`.

use crate::interval::{IntervalError, IntervalSequence};
use crate::observer::{SessionEvent, SessionObserver};
use crate::protocol;
use std::io;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncBufRead, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Item handed from the producer to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// Payload to send, without terminator.
    Line(String),
    /// The source has no more lines.
    End,
}

/// The producer stopped without signalling completion.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("operator input closed")]
    InputClosed,
    #[error("failed to read operator input: {0}")]
    Io(#[from] io::Error),
    #[error("message source aborted: {0}")]
    Aborted(String),
}

/// Reader the interactive source pulls operator lines from.
pub type LineReader = Box<dyn AsyncBufRead + Send + Unpin>;

/// Where outbound lines come from.
pub enum MessageSource {
    /// Operator-typed lines. Unbounded; input closure is fatal.
    Interactive(LineReader),
    /// Lines generated by walking an interval sequence. Finite.
    Scripted(IntervalSequence),
}

impl MessageSource {
    /// Interactive source reading from the process's stdin.
    pub fn stdin() -> Self {
        Self::interactive(BufReader::new(tokio::io::stdin()))
    }

    pub fn interactive<R>(reader: R) -> Self
    where
        R: AsyncBufRead + Send + Unpin + 'static,
    {
        Self::Interactive(Box::new(reader))
    }

    /// Scripted source. The interval string is parsed here, before any I/O.
    pub fn scripted(spec: &str) -> Result<Self, IntervalError> {
        Ok(Self::Scripted(IntervalSequence::parse(spec)?))
    }

    /// Start the producer task.
    pub fn spawn(self, observer: Arc<dyn SessionObserver>) -> SourceHandle {
        let (tx, rx) = mpsc::channel(1);

        let task = match self {
            Self::Interactive(reader) => tokio::spawn(run_interactive(reader, tx, observer)),
            Self::Scripted(sequence) => tokio::spawn(run_scripted(sequence, tx, observer)),
        };

        SourceHandle {
            rx,
            task: Some(task),
        }
    }
}

/// Consumer end of a running source.
pub struct SourceHandle {
    rx: mpsc::Receiver<Outbound>,
    task: Option<JoinHandle<Result<(), SourceError>>>,
}

impl SourceHandle {
    /// Wait for the next line.
    ///
    /// Returns `Ok(None)` once the source has completed. If the producer
    /// stopped without completing, its error is returned.
    pub async fn next(&mut self) -> Result<Option<String>, SourceError> {
        match self.rx.recv().await {
            Some(Outbound::Line(line)) => Ok(Some(line)),
            Some(Outbound::End) => Ok(None),
            None => Err(self.failure().await),
        }
    }

    async fn failure(&mut self) -> SourceError {
        let Some(task) = self.task.take() else {
            return SourceError::Aborted("source already stopped".to_string());
        };

        match task.await {
            Ok(Err(e)) => e,
            Ok(Ok(())) => SourceError::Aborted("source stopped without completing".to_string()),
            Err(e) => SourceError::Aborted(e.to_string()),
        }
    }
}

impl Drop for SourceHandle {
    fn drop(&mut self) {
        // A blocked stdin read cannot be cancelled; this only stops pacing.
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn run_interactive(
    mut reader: LineReader,
    tx: mpsc::Sender<Outbound>,
    observer: Arc<dyn SessionObserver>,
) -> Result<(), SourceError> {
    let mut buf = Vec::new();

    loop {
        observer.notify(SessionEvent::Prompt);

        let Some(text) = protocol::read_line(&mut reader, &mut buf).await? else {
            return Err(SourceError::InputClosed);
        };

        if tx.send(Outbound::Line(text)).await.is_err() {
            // Session is gone
            return Ok(());
        }
    }
}

async fn run_scripted(
    sequence: IntervalSequence,
    tx: mpsc::Sender<Outbound>,
    observer: Arc<dyn SessionObserver>,
) -> Result<(), SourceError> {
    observer.notify(SessionEvent::ScriptStarted {
        events: sequence.len(),
        total_ms: sequence.total_delay().as_millis(),
    });

    for event in sequence {
        for pulse in 0..event.pulses() {
            tokio::time::sleep(event.delay()).await;
            observer.notify(SessionEvent::Pulse {
                event: event.index,
                pulse,
            });
        }

        if tx.send(Outbound::Line(event.payload())).await.is_err() {
            return Ok(());
        }
    }

    let _ = tx.send(Outbound::End).await;
    Ok(())
}
