//! Error types for the AWS collaborators.

/// Errors from the artifact store.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Upload of {key} failed: {message}")]
    UploadFailed { key: String, message: String },
}

/// Errors from the job queue.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Receive from queue failed: {0}")]
    ReceiveFailed(String),

    #[error("Delete from queue failed: {0}")]
    DeleteFailed(String),
}
