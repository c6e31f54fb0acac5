//! Transport abstraction for the feedback stream.
//!
//! The session processes chunks through this seam so the same pipeline
//! runs against a live HTTP response or a scripted replay in tests.

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Response;
use std::collections::VecDeque;
use std::time::Duration;

/// Source of raw byte chunks. `None` signals end-of-stream.
#[async_trait]
pub trait ChunkStream: Send {
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>>;
}

/// Live HTTP response chunk stream
pub struct HttpChunkStream {
    response: Response,
}

impl HttpChunkStream {
    pub fn new(response: Response) -> Self {
        Self { response }
    }
}

#[async_trait]
impl ChunkStream for HttpChunkStream {
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        match self.response.chunk().await {
            Ok(Some(chunk)) => Ok(Some(chunk.to_vec())),
            Ok(None) => Ok(None),
            Err(e) => Err(anyhow::anyhow!("HTTP chunk error: {e}")),
        }
    }
}

/// Replays a fixed chunk sequence, optionally pacing the chunks to
/// simulate network timing. Used by tests and recorded playback.
pub struct ReplayChunkStream {
    chunks: VecDeque<Vec<u8>>,
    delay: Option<Duration>,
}

impl ReplayChunkStream {
    pub fn new(chunks: Vec<Vec<u8>>) -> Self {
        Self {
            chunks: chunks.into(),
            delay: None,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl ChunkStream for ReplayChunkStream {
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.chunks.pop_front())
    }
}
