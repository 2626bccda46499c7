//! Outbound stream to the downstream consumer
//!
//! One [`OutboundStream`] is opened per file and owned by the pipeline run
//! that opened it. Writes go through an async mutex so lines from one logical
//! stream are never interleaved.

use async_trait::async_trait;
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

use crate::config::StreamConfig;
use crate::error::StreamError;
use crate::model::{ColumnLayout, EnrichedRow};

pub mod protocol;

pub use protocol::{StreamHeader, END_OF_STREAM};

/// A line-oriented, write-only session
pub struct OutboundStream<W> {
    writer: Mutex<Option<W>>,
}

impl<W> OutboundStream<W>
where
    W: AsyncWrite + Send + Unpin,
{
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(Some(writer)),
        }
    }

    /// Write one line, terminating it with `\n` when needed
    pub async fn send_line(&self, line: &str) -> Result<(), StreamError> {
        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(StreamError::Closed)?;

        writer.write_all(line.as_bytes()).await?;
        if !line.ends_with('\n') {
            writer.write_all(b"\n").await?;
        }
        writer.flush().await?;
        Ok(())
    }

    pub async fn send_header(&self, header: &StreamHeader) -> Result<(), StreamError> {
        let line = serde_json::to_string(header)?;
        self.send_line(&line).await
    }

    pub async fn send_columns(&self, layout: ColumnLayout) -> Result<(), StreamError> {
        self.send_line(&layout.header_line()).await
    }

    pub async fn send_row(&self, row: &EnrichedRow, layout: ColumnLayout) -> Result<(), StreamError> {
        self.send_line(&row.to_line(layout)).await
    }

    pub async fn send_end(&self) -> Result<(), StreamError> {
        self.send_line(END_OF_STREAM).await
    }

    /// Shut the transport down. Closing twice is a no-op.
    pub async fn close(&self) -> Result<(), StreamError> {
        let writer = self.writer.lock().await.take();
        match writer {
            Some(mut writer) => {
                writer.shutdown().await?;
                debug!("Outbound stream closed");
                Ok(())
            }
            None => Ok(()),
        }
    }

    pub async fn is_closed(&self) -> bool {
        self.writer.lock().await.is_none()
    }
}

/// Opens a fresh [`OutboundStream`] for each file
#[async_trait]
pub trait StreamConnector: Send + Sync {
    type Writer: AsyncWrite + Send + Unpin + 'static;

    async fn connect(&self) -> Result<OutboundStream<Self::Writer>, StreamError>;
}

/// Plain TCP connector
#[derive(Debug, Clone)]
pub struct TcpConnector {
    addr: String,
    connect_timeout: Duration,
}

impl TcpConnector {
    pub fn new(addr: impl Into<String>, connect_timeout: Duration) -> Self {
        Self {
            addr: addr.into(),
            connect_timeout,
        }
    }

    pub fn from_config(config: &StreamConfig) -> Self {
        Self::new(
            &config.addr,
            Duration::from_secs(config.connect_timeout_secs),
        )
    }
}

#[async_trait]
impl StreamConnector for TcpConnector {
    type Writer = TcpStream;

    #[instrument(skip(self), fields(addr = %self.addr))]
    async fn connect(&self) -> Result<OutboundStream<TcpStream>, StreamError> {
        let stream = tokio::time::timeout(self.connect_timeout, TcpStream::connect(&self.addr))
            .await
            .map_err(|_| StreamError::ConnectTimeout(self.addr.clone()))?
            .map_err(|source| StreamError::Connect {
                addr: self.addr.clone(),
                source,
            })?;

        stream.set_nodelay(true)?;
        debug!("Outbound stream connected");

        Ok(OutboundStream::new(stream))
    }
}
