//! Queue consumer loop.
//!
//! Each message moves through
//! `Received → Patched → Submitted → Streaming → ArtifactsUploaded → Completed`,
//! or ends in `Failed`. The message is deleted only after `Completed`,
//! or after a failure that redelivery cannot fix. Every other failure
//! leaves it on the queue so the queue's redelivery retries the whole
//! job; all steps are idempotent, so a retry overwrites rather than
//! duplicates.

use std::sync::Arc;
use std::time::Duration;

use letterpress_cloud::queue::QueuedMessage;
use letterpress_comfyui::render::RenderError;
use letterpress_core::graph::RenderGraph;
use letterpress_core::job::{JobDescriptor, SubmissionHandle};
use letterpress_core::patch::{bindings_for, patch, PatchReport};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::error::{Disposition, JobError};
use crate::ports::{ArtifactSink, JobQueue, RenderBackend, StatusStore};

/// Default polling interval for the consumer loop.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Default number of messages requested per poll.
pub const DEFAULT_MAX_MESSAGES: i32 = 5;

/// Polling parameters.
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    pub poll_interval: Duration,
    pub max_messages: i32,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_messages: DEFAULT_MAX_MESSAGES,
        }
    }
}

/// Lifecycle stage of one job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Received,
    Patched,
    /// The backend accepted the graph.
    Submitted,
    /// The event stream delivered the artifacts, which are now being
    /// uploaded.
    Streaming,
    ArtifactsUploaded,
    Completed,
}

/// Terminal result of processing one message.
#[derive(Debug)]
pub enum JobOutcome {
    Completed {
        job_id: String,
        keys: Vec<String>,
        /// `false` when the acknowledgement itself failed.
        deleted: bool,
    },
    Failed {
        /// `None` when the message could not be parsed.
        job_id: Option<String>,
        /// Last state reached before the failure.
        reached: JobState,
        error: JobError,
        deleted: bool,
    },
}

impl JobOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }

    pub fn deleted(&self) -> bool {
        match self {
            Self::Completed { deleted, .. } | Self::Failed { deleted, .. } => *deleted,
        }
    }
}

/// Counters for one poll.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub received: usize,
    pub completed: usize,
    pub failed: usize,
    pub deleted: usize,
}

/// Tracks the state of the job currently being processed.
struct Progress<'a> {
    job_id: Option<&'a str>,
    state: JobState,
}

impl<'a> Progress<'a> {
    fn new() -> Self {
        Self {
            job_id: None,
            state: JobState::Received,
        }
    }

    fn advance(&mut self, to: JobState) {
        tracing::debug!(job_id = ?self.job_id, from = ?self.state, to = ?to, "Job state transition");
        self.state = to;
    }
}

/// Single-worker queue consumer. Jobs run strictly one after another.
pub struct JobConsumer {
    queue: Arc<dyn JobQueue>,
    render: Arc<dyn RenderBackend>,
    sink: Arc<dyn ArtifactSink>,
    status: Arc<dyn StatusStore>,
    config: ConsumerConfig,
}

impl JobConsumer {
    pub fn new(
        queue: Arc<dyn JobQueue>,
        render: Arc<dyn RenderBackend>,
        sink: Arc<dyn ArtifactSink>,
        status: Arc<dyn StatusStore>,
        config: ConsumerConfig,
    ) -> Self {
        Self {
            queue,
            render,
            sink,
            status,
            config,
        }
    }

    /// Poll until `cancel` is triggered. A job in flight always runs to
    /// its terminal state; cancellation is observed between jobs.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            max_messages = self.config.max_messages,
            "Job consumer started",
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Job consumer shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    match self.poll_once(&cancel).await {
                        Ok(summary) if summary.received > 0 => {
                            tracing::info!(
                                received = summary.received,
                                completed = summary.completed,
                                failed = summary.failed,
                                deleted = summary.deleted,
                                "Batch processed",
                            );
                        }
                        Ok(_) => tracing::debug!("No messages received"),
                        Err(e) => tracing::error!(error = %e, "Failed to receive messages"),
                    }
                }
            }
        }
    }

    /// Receive one batch and process it in delivery order.
    ///
    /// Messages left unprocessed because of cancellation are not
    /// deleted and reappear after the queue's visibility timeout.
    pub async fn poll_once(
        &self,
        cancel: &CancellationToken,
    ) -> Result<BatchSummary, letterpress_cloud::error::QueueError> {
        let messages = self.queue.receive(self.config.max_messages).await?;
        let mut summary = BatchSummary {
            received: messages.len(),
            ..Default::default()
        };

        for message in &messages {
            if cancel.is_cancelled() {
                tracing::info!(
                    remaining = summary.received - summary.completed - summary.failed,
                    "Cancelled; leaving remaining messages for redelivery",
                );
                break;
            }

            let outcome = self.process(message).await;
            if outcome.is_completed() {
                summary.completed += 1;
            } else {
                summary.failed += 1;
            }
            if outcome.deleted() {
                summary.deleted += 1;
            }
        }

        Ok(summary)
    }

    /// Process one message to a terminal outcome and settle its queue
    /// acknowledgement.
    pub async fn process(&self, message: &QueuedMessage) -> JobOutcome {
        let mut progress = Progress::new();

        let job = match JobDescriptor::from_message_body(&message.body) {
            Ok(job) => job,
            Err(e) => return self.fail(message, None, progress.state, e.into()).await,
        };
        progress.job_id = Some(&job.job_id);
        tracing::info!(job_id = %job.job_id, message_id = ?message.message_id, "Job received");

        match self.execute(&job, &mut progress).await {
            Ok(keys) => {
                progress.advance(JobState::Completed);
                let deleted = self.acknowledge(message, &job.job_id).await;
                tracing::info!(job_id = %job.job_id, artifacts = keys.len(), "Job completed");
                JobOutcome::Completed {
                    job_id: job.job_id.clone(),
                    keys,
                    deleted,
                }
            }
            Err(e) => {
                let reached = progress.state;
                self.fail(message, Some(job.job_id.clone()), reached, e)
                    .await
            }
        }
    }

    /// Drive one parsed job up to a recorded completion status.
    async fn execute(
        &self,
        job: &JobDescriptor,
        progress: &mut Progress<'_>,
    ) -> Result<Vec<String>, JobError> {
        let (graph, report) = patch_job(job)?;
        progress.advance(JobState::Patched);
        tracing::debug!(
            job_id = %job.job_id,
            output_node = %report.output_node,
            seeds = ?report.seeds,
            "Render graph patched",
        );

        let handle = SubmissionHandle::new(job.job_id.clone());
        let batch = match self
            .render
            .submit_and_collect(&graph, &report.output_node, &handle)
            .await
        {
            Ok(batch) => batch,
            Err(e) => {
                // Stream errors only occur after the backend took the graph.
                if matches!(e, RenderError::Stream(_)) {
                    progress.advance(JobState::Submitted);
                }
                return Err(e.into());
            }
        };
        progress.advance(JobState::Submitted);
        progress.advance(JobState::Streaming);

        if batch.is_empty() {
            return Err(JobError::NoArtifacts);
        }

        let mut keys = Vec::with_capacity(batch.len());
        for (index, bytes) in batch.sequenced() {
            let key = self.sink.store(&job.job_id, index, bytes.to_vec()).await?;
            keys.push(key);
        }
        progress.advance(JobState::ArtifactsUploaded);

        self.status.mark_complete(&job.job_id).await?;
        Ok(keys)
    }

    async fn fail(
        &self,
        message: &QueuedMessage,
        job_id: Option<String>,
        reached: JobState,
        error: JobError,
    ) -> JobOutcome {
        let disposition = error.disposition();
        let deleted = match disposition {
            Disposition::Permanent => {
                tracing::error!(
                    job_id = ?job_id,
                    message_id = ?message.message_id,
                    error = %error,
                    "Job failed permanently; discarding message",
                );
                self.acknowledge(message, job_id.as_deref().unwrap_or("<unparsed>"))
                    .await
            }
            Disposition::Transient => {
                tracing::warn!(
                    job_id = ?job_id,
                    reached = ?reached,
                    error = %error,
                    "Job failed; message left for redelivery",
                );
                false
            }
        };

        JobOutcome::Failed {
            job_id,
            reached,
            error,
            deleted,
        }
    }

    async fn acknowledge(&self, message: &QueuedMessage, job_id: &str) -> bool {
        match self.queue.delete(&message.delivery_token).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(job_id = %job_id, error = %e, "Failed to delete queue message");
                false
            }
        }
    }
}

/// Clone the job's template and apply the standard bindings.
fn patch_job(job: &JobDescriptor) -> Result<(RenderGraph, PatchReport), JobError> {
    let mut graph = job.prompt_text.clone();
    let report = patch(&mut graph, &bindings_for(job), &mut rand::rng())?;
    Ok((graph, report))
}
