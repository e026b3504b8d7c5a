//! Trait implementations for the production collaborators.

use async_trait::async_trait;
use letterpress_cloud::error::{QueueError, StorageError};
use letterpress_cloud::queue::{QueuedMessage, SqsJobQueue};
use letterpress_cloud::storage::S3ArtifactSink;
use letterpress_comfyui::render::{RenderError, RenderStreamClient};
use letterpress_core::graph::RenderGraph;
use letterpress_core::job::{ArtifactBatch, SubmissionHandle};
use letterpress_db::repositories::{LetterRepo, IMAGE_STATUS_COMPLETE};
use letterpress_db::DbPool;

use crate::ports::{ArtifactSink, JobQueue, RenderBackend, StatusStore};

#[async_trait]
impl JobQueue for SqsJobQueue {
    async fn receive(&self, max_messages: i32) -> Result<Vec<QueuedMessage>, QueueError> {
        SqsJobQueue::receive(self, max_messages).await
    }

    async fn delete(&self, delivery_token: &str) -> Result<(), QueueError> {
        SqsJobQueue::delete(self, delivery_token).await
    }
}

#[async_trait]
impl RenderBackend for RenderStreamClient {
    async fn submit_and_collect(
        &self,
        graph: &RenderGraph,
        output_node: &str,
        handle: &SubmissionHandle,
    ) -> Result<ArtifactBatch, RenderError> {
        RenderStreamClient::submit_and_collect(self, graph, output_node, handle).await
    }
}

#[async_trait]
impl ArtifactSink for S3ArtifactSink {
    async fn store(
        &self,
        job_id: &str,
        index: usize,
        bytes: Vec<u8>,
    ) -> Result<String, StorageError> {
        S3ArtifactSink::store(self, job_id, index, bytes).await
    }
}

/// [`StatusStore`] over the `tbl_letter` table.
#[derive(Clone)]
pub struct MySqlStatusStore {
    pool: DbPool,
}

impl MySqlStatusStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StatusStore for MySqlStatusStore {
    async fn mark_complete(&self, job_id: &str) -> Result<(), sqlx::Error> {
        let changed =
            LetterRepo::set_image_status(&self.pool, job_id, IMAGE_STATUS_COMPLETE).await?;
        if changed == 0 {
            // Either the letter is unknown or it was already complete.
            tracing::warn!(job_id = %job_id, "Status update changed no rows");
        }
        Ok(())
    }
}
