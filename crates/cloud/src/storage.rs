//! S3 artifact store.
//!
//! Objects are written with `PutObject` under keys from
//! [`artifact_key`], so storing the same artifact twice overwrites it.

use aws_config::SdkConfig;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use letterpress_core::naming::artifact_key;

use crate::error::StorageError;

/// Content type of stored artifacts.
pub const ARTIFACT_CONTENT_TYPE: &str = "image/jpeg";

/// Artifact store backed by one S3 bucket.
#[derive(Clone)]
pub struct S3ArtifactSink {
    client: Client,
    bucket: String,
}

impl S3ArtifactSink {
    pub fn new(sdk_config: &SdkConfig, bucket: String) -> Self {
        Self {
            client: Client::new(sdk_config),
            bucket,
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Upload the `index`-th artifact of `job_id`, returning its key.
    pub async fn store(
        &self,
        job_id: &str,
        index: usize,
        bytes: Vec<u8>,
    ) -> Result<String, StorageError> {
        let key = artifact_key(job_id, index);
        let size = bytes.len();

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(bytes))
            .content_type(ARTIFACT_CONTENT_TYPE)
            .send()
            .await
            .map_err(|e| StorageError::UploadFailed {
                key: key.clone(),
                message: DisplayErrorContext(&e).to_string(),
            })?;

        tracing::debug!(bucket = %self.bucket, key = %key, bytes = size, "Artifact uploaded");
        Ok(key)
    }
}
