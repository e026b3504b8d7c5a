//! Shared AWS SDK configuration.

use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_credential_types::Credentials;

/// Provider name attached to credentials read from the environment.
const CREDENTIALS_PROVIDER: &str = "letterpress-env";

/// Region and optional static credentials for the AWS clients.
///
/// Anything left unset falls back to the SDK's default provider chain.
#[derive(Debug, Clone, Default)]
pub struct AwsSettings {
    pub region: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
}

/// Build the [`SdkConfig`] shared by the S3 and SQS clients.
pub async fn load_sdk_config(settings: &AwsSettings) -> SdkConfig {
    let mut loader = aws_config::defaults(BehaviorVersion::latest());

    if let Some(region) = &settings.region {
        loader = loader.region(Region::new(region.clone()));
    }

    if let (Some(key_id), Some(secret)) = (&settings.access_key_id, &settings.secret_access_key) {
        loader = loader.credentials_provider(Credentials::new(
            key_id,
            secret,
            None,
            None,
            CREDENTIALS_PROVIDER,
        ));
    }

    loader.load().await
}
