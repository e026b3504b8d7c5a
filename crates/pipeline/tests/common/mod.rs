//! In-memory collaborators for consumer tests.

#![allow(dead_code)]

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use letterpress_cloud::error::{QueueError, StorageError};
use letterpress_cloud::queue::QueuedMessage;
use letterpress_comfyui::render::RenderError;
use letterpress_core::graph::RenderGraph;
use letterpress_core::job::{ArtifactBatch, SubmissionHandle};
use letterpress_core::naming::artifact_key;
use letterpress_pipeline::consumer::{ConsumerConfig, JobConsumer};
use letterpress_pipeline::ports::{ArtifactSink, JobQueue, RenderBackend, StatusStore};
use serde_json::json;

// ---------------------------------------------------------------------------
// Queue
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeQueue {
    batches: Mutex<VecDeque<Vec<QueuedMessage>>>,
    pub receive_calls: Mutex<usize>,
    pub deleted: Mutex<Vec<String>>,
    pub fail_delete: Mutex<bool>,
}

impl FakeQueue {
    pub fn with_batches(batches: Vec<Vec<QueuedMessage>>) -> Self {
        Self {
            batches: Mutex::new(batches.into()),
            ..Default::default()
        }
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }
}

#[async_trait]
impl JobQueue for FakeQueue {
    async fn receive(&self, _max_messages: i32) -> Result<Vec<QueuedMessage>, QueueError> {
        *self.receive_calls.lock().unwrap() += 1;
        Ok(self.batches.lock().unwrap().pop_front().unwrap_or_default())
    }

    async fn delete(&self, delivery_token: &str) -> Result<(), QueueError> {
        if *self.fail_delete.lock().unwrap() {
            return Err(QueueError::DeleteFailed("throttled".into()));
        }
        self.deleted.lock().unwrap().push(delivery_token.to_string());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Render backend
// ---------------------------------------------------------------------------

/// Returns scripted results in order; once the script is exhausted every
/// submission yields one artifact for the requested output node.
#[derive(Default)]
pub struct FakeRender {
    script: Mutex<VecDeque<Result<ArtifactBatch, RenderError>>>,
    pub submissions: Mutex<Vec<(RenderGraph, String, SubmissionHandle)>>,
}

impl FakeRender {
    pub fn push(&self, result: Result<ArtifactBatch, RenderError>) {
        self.script.lock().unwrap().push_back(result);
    }

    pub fn submissions(&self) -> Vec<(RenderGraph, String, SubmissionHandle)> {
        self.submissions.lock().unwrap().clone()
    }
}

#[async_trait]
impl RenderBackend for FakeRender {
    async fn submit_and_collect(
        &self,
        graph: &RenderGraph,
        output_node: &str,
        handle: &SubmissionHandle,
    ) -> Result<ArtifactBatch, RenderError> {
        self.submissions.lock().unwrap().push((
            graph.clone(),
            output_node.to_string(),
            handle.clone(),
        ));

        match self.script.lock().unwrap().pop_front() {
            Some(result) => result,
            None => Ok(batch_of(output_node, &[b"jpeg"])),
        }
    }
}

pub fn batch_of(node: &str, payloads: &[&[u8]]) -> ArtifactBatch {
    let mut batch = ArtifactBatch::new();
    for payload in payloads {
        batch.push(node, payload.to_vec());
    }
    batch
}

// ---------------------------------------------------------------------------
// Artifact sink
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeSink {
    pub objects: Mutex<BTreeMap<String, Vec<u8>>>,
    pub writes: Mutex<Vec<String>>,
    /// Fail the upload with this sequence index.
    pub fail_at: Mutex<Option<usize>>,
}

impl FakeSink {
    pub fn keys(&self) -> Vec<String> {
        self.objects.lock().unwrap().keys().cloned().collect()
    }

    pub fn writes(&self) -> Vec<String> {
        self.writes.lock().unwrap().clone()
    }
}

#[async_trait]
impl ArtifactSink for FakeSink {
    async fn store(
        &self,
        job_id: &str,
        index: usize,
        bytes: Vec<u8>,
    ) -> Result<String, StorageError> {
        let key = artifact_key(job_id, index);
        if *self.fail_at.lock().unwrap() == Some(index) {
            return Err(StorageError::UploadFailed {
                key,
                message: "connection reset".into(),
            });
        }
        self.writes.lock().unwrap().push(key.clone());
        self.objects.lock().unwrap().insert(key.clone(), bytes);
        Ok(key)
    }
}

// ---------------------------------------------------------------------------
// Status store
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeStatus {
    pub completed: Mutex<Vec<String>>,
    pub fail: Mutex<bool>,
}

impl FakeStatus {
    pub fn completed(&self) -> Vec<String> {
        self.completed.lock().unwrap().clone()
    }
}

#[async_trait]
impl StatusStore for FakeStatus {
    async fn mark_complete(&self, job_id: &str) -> Result<(), sqlx::Error> {
        if *self.fail.lock().unwrap() {
            return Err(sqlx::Error::PoolTimedOut);
        }
        self.completed.lock().unwrap().push(job_id.to_string());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub struct Harness {
    pub queue: Arc<FakeQueue>,
    pub render: Arc<FakeRender>,
    pub sink: Arc<FakeSink>,
    pub status: Arc<FakeStatus>,
    pub consumer: Arc<JobConsumer>,
}

impl Harness {
    pub fn new(batches: Vec<Vec<QueuedMessage>>) -> Self {
        Self::with_config(batches, ConsumerConfig::default())
    }

    pub fn with_config(batches: Vec<Vec<QueuedMessage>>, config: ConsumerConfig) -> Self {
        let queue = Arc::new(FakeQueue::with_batches(batches));
        let render = Arc::new(FakeRender::default());
        let sink = Arc::new(FakeSink::default());
        let status = Arc::new(FakeStatus::default());
        let consumer = Arc::new(JobConsumer::new(
            queue.clone(),
            render.clone(),
            sink.clone(),
            status.clone(),
            config,
        ));
        Self {
            queue,
            render,
            sink,
            status,
            consumer,
        }
    }
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// Template with positive, sampler and save-image nodes.
pub fn template() -> serde_json::Value {
    json!({
        "3": {
            "class_type": "KSampler",
            "_meta": {"title": "Sampler"},
            "inputs": {"seed": 0, "steps": 20}
        },
        "6": {
            "class_type": "CLIPTextEncode",
            "_meta": {"title": "Positive"},
            "inputs": {"text": "sitting"}
        },
        "9": {
            "class_type": "SaveImageS3",
            "_meta": {"title": "Save Image With S3 Upload"},
            "inputs": {"filename_prefix": "ComfyUI"}
        }
    })
}

pub fn message(token: &str, body: serde_json::Value) -> QueuedMessage {
    QueuedMessage {
        message_id: Some(format!("id-{token}")),
        body: body.to_string(),
        delivery_token: token.to_string(),
    }
}

pub fn job_message(token: &str, job_id: &str) -> QueuedMessage {
    message(
        token,
        json!({
            "letter_id": job_id,
            "keywords": "a red cat, ",
            "prompt_text": template(),
        }),
    )
}
