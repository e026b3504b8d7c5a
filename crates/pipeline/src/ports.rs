//! Collaborator seams used by the job consumer.
//!
//! Production implementations live in [`crate::adapters`]; tests supply
//! in-memory fakes.

use async_trait::async_trait;
use letterpress_cloud::error::{QueueError, StorageError};
use letterpress_cloud::queue::QueuedMessage;
use letterpress_comfyui::render::RenderError;
use letterpress_core::graph::RenderGraph;
use letterpress_core::job::{ArtifactBatch, SubmissionHandle};

/// Source of job messages with explicit acknowledgement.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Receive up to `max_messages` messages.
    async fn receive(&self, max_messages: i32) -> Result<Vec<QueuedMessage>, QueueError>;

    /// Acknowledge a message so it is not redelivered.
    async fn delete(&self, delivery_token: &str) -> Result<(), QueueError>;
}

/// Render backend that runs a patched graph and returns its artifacts.
#[async_trait]
pub trait RenderBackend: Send + Sync {
    async fn submit_and_collect(
        &self,
        graph: &RenderGraph,
        output_node: &str,
        handle: &SubmissionHandle,
    ) -> Result<ArtifactBatch, RenderError>;
}

/// Durable artifact storage. Storing the same `(job_id, index)` twice
/// overwrites.
#[async_trait]
pub trait ArtifactSink: Send + Sync {
    /// Store one artifact, returning its key.
    async fn store(&self, job_id: &str, index: usize, bytes: Vec<u8>)
        -> Result<String, StorageError>;
}

/// Job completion record.
#[async_trait]
pub trait StatusStore: Send + Sync {
    async fn mark_complete(&self, job_id: &str) -> Result<(), sqlx::Error>;
}
