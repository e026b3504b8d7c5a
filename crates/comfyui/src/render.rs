//! Submit-and-collect client for one render job.
//!
//! [`RenderStreamClient`] opens a WebSocket for a fresh client id,
//! submits the patched graph under that id, and drains the stream
//! until ComfyUI reports the prompt finished. The socket lives only
//! for the duration of one call and is closed on every exit path.

use std::time::Duration;

use letterpress_core::graph::RenderGraph;
use letterpress_core::job::{ArtifactBatch, SubmissionHandle};

use crate::api::{ComfyUIApi, ComfyUIApiError};
use crate::client::{ComfyUIClient, ComfyUIClientError, ComfyUIStream};
use crate::processor::{collect_artifacts, StreamError};

/// Errors from a submit-and-collect round.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// The event stream could not be opened.
    #[error(transparent)]
    Connect(#[from] ComfyUIClientError),

    /// ComfyUI refused the graph or the HTTP call failed.
    #[error(transparent)]
    Submit(#[from] ComfyUIApiError),

    /// The event stream ended badly before the prompt finished.
    #[error(transparent)]
    Stream(#[from] StreamError),
}

/// Render backend client bound to one ComfyUI instance.
#[derive(Clone)]
pub struct RenderStreamClient {
    client: ComfyUIClient,
    api: ComfyUIApi,
    idle_timeout: Option<Duration>,
}

impl RenderStreamClient {
    /// * `ws_url`  - WebSocket base URL, e.g. `ws://host:8188`.
    /// * `api_url` - HTTP base URL, e.g. `http://host:8188`.
    pub fn new(ws_url: String, api_url: String) -> Self {
        Self {
            client: ComfyUIClient::new(ws_url),
            api: ComfyUIApi::new(api_url),
            idle_timeout: None,
        }
    }

    /// Fail a job when no frame arrives for `timeout`. `None` waits
    /// indefinitely.
    pub fn with_idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Submit `graph` and collect the frames `output_node` produces.
    ///
    /// The socket is opened before submission so no early frames are
    /// lost.
    pub async fn submit_and_collect(
        &self,
        graph: &RenderGraph,
        output_node: &str,
        handle: &SubmissionHandle,
    ) -> Result<ArtifactBatch, RenderError> {
        let conn = self.client.connect(&handle.client_session_id).await?;
        let mut ws_stream = conn.ws_stream;

        let result = self
            .submit_and_drain(&mut ws_stream, graph, output_node, handle)
            .await;

        close_quietly(&mut ws_stream, &handle.client_session_id).await;
        result
    }

    async fn submit_and_drain(
        &self,
        ws_stream: &mut ComfyUIStream,
        graph: &RenderGraph,
        output_node: &str,
        handle: &SubmissionHandle,
    ) -> Result<ArtifactBatch, RenderError> {
        let submitted = self
            .api
            .submit_workflow(graph.as_map(), &handle.client_session_id)
            .await?;

        tracing::info!(
            job_id = %handle.job_id,
            client_id = %handle.client_session_id,
            prompt_id = %submitted.prompt_id,
            queue_position = submitted.number,
            "Workflow submitted to ComfyUI",
        );

        let batch =
            collect_artifacts(ws_stream, &submitted.prompt_id, output_node, self.idle_timeout)
                .await?;

        tracing::info!(
            job_id = %handle.job_id,
            prompt_id = %submitted.prompt_id,
            artifacts = batch.len(),
            "Render finished",
        );
        Ok(batch)
    }
}

/// Attempt a close handshake; the socket is dropped either way.
async fn close_quietly(ws_stream: &mut ComfyUIStream, client_id: &str) {
    if let Err(e) = ws_stream.close(None).await {
        tracing::debug!(client_id = %client_id, error = %e, "WebSocket close failed");
    }
}
