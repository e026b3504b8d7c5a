//! AWS-backed collaborators: S3 artifact storage and the SQS job queue.

pub mod aws;
pub mod error;
pub mod queue;
pub mod storage;
