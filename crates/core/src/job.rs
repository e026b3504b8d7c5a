//! Queue job descriptors and per-submission correlation types.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::error::CoreError;
use crate::graph::RenderGraph;

/// One render request, parsed from a queue message body.
///
/// ```json
/// {"letter_id": "L42", "keywords": "a red cat, ", "prompt_text": {...}, "character_id": "7"}
/// ```
///
/// `job_id` is also accepted under its legacy name `letter_id`. When a
/// body carries both, `job_id` wins.
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "RawDescriptor")]
pub struct JobDescriptor {
    pub job_id: String,
    pub keywords: String,
    pub prompt_text: RenderGraph,
    pub character_id: Option<String>,
}

/// Wire shape of a descriptor, before the job id is resolved.
#[derive(Deserialize)]
struct RawDescriptor {
    #[serde(default)]
    job_id: Option<String>,
    #[serde(default)]
    letter_id: Option<String>,
    keywords: String,
    prompt_text: RenderGraph,
    #[serde(default)]
    character_id: Option<String>,
}

impl TryFrom<RawDescriptor> for JobDescriptor {
    type Error = String;

    fn try_from(raw: RawDescriptor) -> Result<Self, Self::Error> {
        let job_id = raw
            .job_id
            .or(raw.letter_id)
            .ok_or_else(|| "missing field `job_id`".to_string())?;

        Ok(Self {
            job_id,
            keywords: raw.keywords,
            prompt_text: raw.prompt_text,
            character_id: raw.character_id,
        })
    }
}

impl JobDescriptor {
    /// Parse and validate a queue message body.
    pub fn from_message_body(body: &str) -> Result<Self, CoreError> {
        let job: Self =
            serde_json::from_str(body).map_err(|e| CoreError::Malformed(e.to_string()))?;

        if job.job_id.trim().is_empty() {
            return Err(CoreError::Malformed("job_id must not be empty".into()));
        }
        Ok(job)
    }
}

/// Correlation pair for one submission to the render backend.
///
/// `client_session_id` is freshly generated per submission so a retried
/// job never shares an event channel with its earlier attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionHandle {
    pub job_id: String,
    pub client_session_id: String,
}

impl SubmissionHandle {
    pub fn new(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            client_session_id: uuid::Uuid::new_v4().to_string(),
        }
    }
}

/// Artifacts collected from one execution, keyed by output node id.
///
/// Payloads under a node keep their arrival order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArtifactBatch {
    outputs: BTreeMap<String, Vec<Vec<u8>>>,
}

impl ArtifactBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, node_id: &str, payload: Vec<u8>) {
        self.outputs
            .entry(node_id.to_string())
            .or_default()
            .push(payload);
    }

    /// Payloads recorded for one output node.
    pub fn get(&self, node_id: &str) -> &[Vec<u8>] {
        self.outputs.get(node_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Total number of payloads across all nodes.
    pub fn len(&self) -> usize {
        self.outputs.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every payload with its sequence index: nodes in key order, then
    /// arrival order within a node, numbered from 0.
    pub fn sequenced(&self) -> impl Iterator<Item = (usize, &[u8])> {
        self.outputs
            .values()
            .flatten()
            .map(Vec::as_slice)
            .enumerate()
    }
}
