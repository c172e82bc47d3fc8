//! Mutation sinks
//!
//! A sink receives every [`MutationGroup`] in order. Delivery policy belongs to
//! the sink: the pipeline never retries, and stops on the first error.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::error::SinkError;
use crate::mutation::MutationGroup;

/// Destination for mutation groups
#[async_trait]
pub trait Sink: Send {
    /// Deliver one group
    async fn submit(&mut self, group: &MutationGroup) -> Result<(), SinkError>;

    /// Flush anything buffered; called once after the last group
    async fn finish(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Writes one JSON-encoded group per line
pub struct JsonLinesSink<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin + Send> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> Sink for JsonLinesSink<W> {
    async fn submit(&mut self, group: &MutationGroup) -> Result<(), SinkError> {
        let mut line = serde_json::to_vec(group)?;
        line.push(b'\n');
        self.writer.write_all(&line).await?;
        Ok(())
    }

    async fn finish(&mut self) -> Result<(), SinkError> {
        self.writer.flush().await?;
        Ok(())
    }
}

/// Submits each group as one request to a mutation service
///
/// The response body is read to the end as a byte stream so the service can
/// stream back per-statement results.
pub struct HttpSink {
    http: Client,
    url: String,
    submitted: u64,
}

impl HttpSink {
    /// Create a sink posting to `url`, with `timeout` applied to every request
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, SinkError> {
        let url = url.into();
        debug!(%url, ?timeout, "HttpSink::new: called");
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            url,
            submitted: 0,
        })
    }

    /// Groups accepted by the service so far
    pub fn submitted(&self) -> u64 {
        self.submitted
    }
}

#[async_trait]
impl Sink for HttpSink {
    async fn submit(&mut self, group: &MutationGroup) -> Result<(), SinkError> {
        let response = self.http.post(&self.url).json(group).send().await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(SinkError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let mut body = response.bytes_stream();
        let mut received = 0usize;
        while let Some(chunk) = body.next().await {
            received += chunk?.len();
        }
        self.submitted += 1;
        debug!(received, submitted = self.submitted, "HttpSink::submit: response consumed");
        Ok(())
    }
}

/// Keeps every group in memory
#[derive(Debug, Default)]
pub struct CollectSink {
    pub groups: Vec<MutationGroup>,
}

impl CollectSink {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Sink for CollectSink {
    async fn submit(&mut self, group: &MutationGroup) -> Result<(), SinkError> {
        self.groups.push(group.clone());
        Ok(())
    }
}
