//! Channel ends connecting adjacent stages

use std::io::{self, Read};

use bytes::{Buf, Bytes};
use tokio::sync::mpsc;
use tracing::debug;

use super::{Item, StageError};

/// Create a bounded channel between two stages
///
/// The bound is what gives the chain backpressure: a producer waits once
/// `capacity` items are queued for a slow consumer.
pub fn channel(capacity: usize) -> (StageOutput, StageInput) {
    debug!(capacity, "channel: called");
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (StageOutput { tx }, StageInput { rx })
}

/// Sending end held by the upstream stage
#[derive(Debug, Clone)]
pub struct StageOutput {
    tx: mpsc::Sender<Item>,
}

impl StageOutput {
    pub async fn send(&self, item: impl Into<Item>) -> Result<(), StageError> {
        self.tx.send(item.into()).await.map_err(|_| StageError::DownstreamClosed)
    }

    /// Send from a blocking worker thread
    pub fn blocking_send(&self, item: impl Into<Item>) -> Result<(), StageError> {
        self.tx
            .blocking_send(item.into())
            .map_err(|_| StageError::DownstreamClosed)
    }
}

/// Receiving end held by the downstream stage
#[derive(Debug)]
pub struct StageInput {
    rx: mpsc::Receiver<Item>,
}

impl StageInput {
    /// Next item, or `None` once the upstream stage has finished
    pub async fn recv(&mut self) -> Option<Item> {
        self.rx.recv().await
    }

    /// Receive from a blocking worker thread
    pub fn blocking_recv(&mut self) -> Option<Item> {
        self.rx.blocking_recv()
    }

    /// Drain and discard everything until the upstream finishes
    pub async fn drain(mut self) -> Result<(), StageError> {
        while self.rx.recv().await.is_some() {}
        Ok(())
    }

    /// Adapt this input into a blocking `Read` over byte items
    pub fn into_reader(self, stage: &'static str, line_terminator: bool) -> ItemReader {
        ItemReader {
            input: self,
            stage,
            line_terminator,
            current: Bytes::new(),
            failure: None,
        }
    }
}

/// Blocking `std::io::Read` over a stage input
///
/// Must only be used from a blocking worker (`spawn_blocking`). `Line` items
/// get a trailing `\n` when `line_terminator` is set, so line-oriented
/// upstreams still produce well-formed records. Items that are not text or
/// bytes stop the reader; the original failure is kept in `failure`.
pub struct ItemReader {
    input: StageInput,
    stage: &'static str,
    line_terminator: bool,
    current: Bytes,
    failure: Option<StageError>,
}

impl ItemReader {
    /// Take the stage error that interrupted reading, if any
    pub fn take_failure(&mut self) -> Option<StageError> {
        self.failure.take()
    }

    fn next_chunk(&mut self) -> io::Result<bool> {
        match self.input.blocking_recv() {
            Some(Item::Bytes(bytes)) => {
                self.current = bytes;
                Ok(true)
            }
            Some(Item::Line(mut line)) => {
                if self.line_terminator {
                    line.push('\n');
                }
                self.current = Bytes::from(line);
                Ok(true)
            }
            Some(other) => {
                let kind = other.kind();
                self.failure = Some(StageError::UnsupportedItem {
                    stage: self.stage,
                    item: kind,
                });
                Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("{} cannot read {} items", self.stage, kind),
                ))
            }
            None => Ok(false),
        }
    }
}

impl Read for ItemReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while self.current.is_empty() {
            if !self.next_chunk()? {
                return Ok(0);
            }
        }

        let n = buf.len().min(self.current.len());
        buf[..n].copy_from_slice(&self.current[..n]);
        self.current.advance(n);
        Ok(n)
    }
}
