//! Job failure taxonomy.

use letterpress_cloud::error::StorageError;
use letterpress_comfyui::processor::StreamError;
use letterpress_comfyui::render::RenderError;
use letterpress_core::error::CoreError;

/// Whether redelivering a failed job could succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Retrying cannot help; the message is deleted to avoid a poison
    /// loop.
    Permanent,
    /// The message is left on the queue for redelivery.
    Transient,
}

/// Why a job did not reach completion.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    /// The message body is not a valid job descriptor.
    #[error("Malformed job message: {0}")]
    Malformed(#[source] CoreError),

    /// The render-graph template lacks a required role or field.
    #[error("Configuration error: {0}")]
    Configuration(#[source] CoreError),

    /// The backend could not be reached or rejected the graph.
    #[error("Submission failed: {0}")]
    Submission(#[source] RenderError),

    /// The event stream ended before the prompt finished.
    #[error("Event stream failed: {0}")]
    Stream(#[source] StreamError),

    /// The prompt finished without producing any artifact.
    #[error("Render finished without producing artifacts")]
    NoArtifacts,

    /// An artifact could not be stored.
    #[error("Artifact upload failed: {0}")]
    Upload(#[from] StorageError),

    /// The completion status could not be recorded.
    #[error("Status update failed: {0}")]
    Store(#[source] sqlx::Error),
}

impl JobError {
    pub fn disposition(&self) -> Disposition {
        match self {
            Self::Malformed(_) | Self::Configuration(_) => Disposition::Permanent,
            Self::Submission(_)
            | Self::Stream(_)
            | Self::NoArtifacts
            | Self::Upload(_)
            | Self::Store(_) => Disposition::Transient,
        }
    }
}

impl From<CoreError> for JobError {
    fn from(e: CoreError) -> Self {
        if e.is_configuration() {
            Self::Configuration(e)
        } else {
            Self::Malformed(e)
        }
    }
}

impl From<RenderError> for JobError {
    fn from(e: RenderError) -> Self {
        match e {
            RenderError::Stream(stream) => Self::Stream(stream),
            other => Self::Submission(other),
        }
    }
}

impl From<sqlx::Error> for JobError {
    fn from(e: sqlx::Error) -> Self {
        Self::Store(e)
    }
}
