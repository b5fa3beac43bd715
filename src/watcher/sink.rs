//! Where extracted records go.

use async_trait::async_trait;
use std::io::Write;
use tokio::sync::mpsc;

use crate::core::config::record::STDOUT_PREFIX;
use crate::core::error::{AppError, AppResult};
use crate::extract::transport::{bounded, encode_line};
use crate::extract::ContentRecord;

/// Downstream consumer of records. Delivery is at-least-once.
#[async_trait]
pub trait RecordSink: Send + Sync {
    async fn emit(&self, record: &ContentRecord) -> AppResult<()>;
}

/// Line protocol on stdout: `CONTENT_EXTRACTED: {json}`, flushed per record.
#[derive(Debug, Default)]
pub struct StdoutSink;

#[async_trait]
impl RecordSink for StdoutSink {
    async fn emit(&self, record: &ContentRecord) -> AppResult<()> {
        let line = encode_line(record)?;
        write_line(&line)?;
        log::info!("Emitted record for {} ({} bytes)", record.url, line.len());
        Ok(())
    }
}

fn write_line(json: &str) -> std::io::Result<()> {
    let mut out = std::io::stdout().lock();
    writeln!(out, "{} {}", STDOUT_PREFIX, json)?;
    out.flush()
}

/// Sends bounded records into an in-process channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<ContentRecord>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::UnboundedSender<ContentRecord>) -> Self {
        Self { tx }
    }

    /// Sink plus the receiving end.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ContentRecord>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }
}

#[async_trait]
impl RecordSink for ChannelSink {
    async fn emit(&self, record: &ContentRecord) -> AppResult<()> {
        self.tx
            .send(bounded(record))
            .map_err(|_| AppError::Delivery("record channel closed".to_string()))
    }
}
