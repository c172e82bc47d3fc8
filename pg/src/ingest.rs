//! Streaming line ingestion
//!
//! A reader task splits the input on newlines and pushes raw lines into a
//! bounded channel; the consumer decodes them into records. The channel gives
//! back-pressure once it is full and keeps input order. A separate shutdown
//! channel lets the consumer stop the reader even while it is blocked on a
//! full buffer.

use std::path::Path;

use futures::Stream;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::error::IngestError;
use crate::{READ_BUFFER_SIZE, Record};

/// Counters for one ingestion run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    /// Non-blank lines read from the input
    pub lines: u64,
    /// Lines decoded into records
    pub records: u64,
    /// Lines that failed to decode
    pub malformed: u64,
}

/// Lazy sequence of decoded records fed by a background reader
pub struct RecordStream {
    rx: mpsc::Receiver<Vec<u8>>,
    shutdown_tx: mpsc::Sender<()>,
    reader: JoinHandle<Result<u64, IngestError>>,
    records: u64,
    malformed: u64,
}

impl RecordStream {
    /// Start reading `source` with a buffer of `capacity` lines
    pub fn spawn<R>(source: R, capacity: usize) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        debug!(capacity, "RecordStream::spawn: called");
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let reader = tokio::spawn(read_lines(
            BufReader::with_capacity(READ_BUFFER_SIZE, source),
            tx,
            shutdown_rx,
        ));

        Self {
            rx,
            shutdown_tx,
            reader,
            records: 0,
            malformed: 0,
        }
    }

    /// Open a file (or stdin for `-`) and start reading it
    pub async fn open(path: impl AsRef<Path>, capacity: usize) -> Result<Self, IngestError> {
        let path = path.as_ref();
        if path == Path::new("-") {
            debug!("RecordStream::open: reading stdin");
            return Ok(Self::spawn(tokio::io::stdin(), capacity));
        }

        let file = tokio::fs::File::open(path).await.map_err(|source| IngestError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), "Reading records");
        Ok(Self::spawn(file, capacity))
    }

    /// Next raw line, without its line terminator
    pub async fn next_line(&mut self) -> Option<Vec<u8>> {
        self.rx.recv().await
    }

    /// Next decodable record; lines that fail to decode are skipped
    pub async fn next_record(&mut self) -> Option<Record> {
        while let Some(line) = self.rx.recv().await {
            match serde_json::from_slice::<Record>(&line) {
                Ok(record) => {
                    self.records += 1;
                    return Some(record);
                }
                Err(e) => {
                    self.malformed += 1;
                    debug!(error = %e, len = line.len(), "next_record: skipping malformed line");
                }
            }
        }
        None
    }

    /// Lines that failed to decode so far
    pub fn malformed(&self) -> u64 {
        self.malformed
    }

    /// Ask the reader to stop; buffered lines are still delivered
    pub fn shutdown(&self) {
        debug!("RecordStream::shutdown: called");
        let _ = self.shutdown_tx.try_send(());
    }

    /// Stop the reader if still running and collect the final counts
    pub async fn finish(self) -> Result<IngestStats, IngestError> {
        let RecordStream {
            rx,
            shutdown_tx,
            reader,
            records,
            malformed,
        } = self;
        drop(rx);
        drop(shutdown_tx);

        let lines = reader.await??;
        debug!(lines, records, malformed, "RecordStream::finish: reader joined");
        Ok(IngestStats {
            lines,
            records,
            malformed,
        })
    }

    /// Consume the stream as a [`futures::Stream`] of records
    pub fn into_records(self) -> impl Stream<Item = Record> {
        futures::stream::unfold(self, |mut stream| async move {
            stream.next_record().await.map(|record| (record, stream))
        })
    }
}

/// Reader task: forward each non-blank line until EOF, error, or shutdown
async fn read_lines<R>(
    mut reader: R,
    tx: mpsc::Sender<Vec<u8>>,
    mut shutdown_rx: mpsc::Receiver<()>,
) -> Result<u64, IngestError>
where
    R: tokio::io::AsyncBufRead + Unpin,
{
    let mut lines = 0u64;
    loop {
        let mut buf = Vec::new();
        let read = tokio::select! {
            biased;
            _ = shutdown_rx.recv() => {
                debug!(lines, "read_lines: shutdown while reading");
                break;
            }
            read = reader.read_until(b'\n', &mut buf) => read,
        };

        match read {
            Ok(0) => {
                debug!(lines, "read_lines: end of input");
                break;
            }
            Ok(_) => {
                if buf.last() == Some(&b'\n') {
                    buf.pop();
                }
                if buf.last() == Some(&b'\r') {
                    buf.pop();
                }
                if buf.iter().all(u8::is_ascii_whitespace) {
                    continue;
                }
                lines += 1;

                tokio::select! {
                    biased;
                    _ = shutdown_rx.recv() => {
                        debug!(lines, "read_lines: shutdown while buffer full");
                        break;
                    }
                    sent = tx.send(buf) => {
                        if sent.is_err() {
                            debug!(lines, "read_lines: consumer gone");
                            break;
                        }
                    }
                }
            }
            Err(source) => return Err(IngestError::Read { lines, source }),
        }
    }
    Ok(lines)
}
