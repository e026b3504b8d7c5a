//! Worker configuration loaded from environment variables.
//!
//! | Env Var                    | Required | Default                 |
//! |----------------------------|----------|-------------------------|
//! | `COMFYUI_API_URL`          | no       | `http://127.0.0.1:8188` |
//! | `COMFYUI_WS_URL`           | no       | `ws://127.0.0.1:8188`   |
//! | `AWS_QUEUE_URL`            | yes      | --                      |
//! | `AWS_REGION`               | no       | SDK default chain       |
//! | `CREDENTIALS_ACCESS_KEY`   | no       | SDK default chain       |
//! | `CREDENTIALS_SECRET_KEY`   | no       | SDK default chain       |
//! | `S3_BUCKET`                | yes      | --                      |
//! | `host`                     | yes      | --                      |
//! | `db_name`                  | yes      | --                      |
//! | `user`                     | yes      | --                      |
//! | `password`                 | yes      | --                      |
//! | `DB_PORT`                  | no       | `3306`                  |
//! | `POLL_INTERVAL_SECS`       | no       | `5` (must be positive)  |
//! | `MAX_MESSAGES`             | no       | `5`                     |
//! | `RECEIVE_WAIT_SECS`        | no       | `0`                     |
//! | `FRAME_IDLE_TIMEOUT_SECS`  | no       | `600` (`0` disables)    |

use std::str::FromStr;
use std::time::Duration;

use letterpress_cloud::aws::AwsSettings;
use letterpress_cloud::queue::MAX_BATCH_SIZE;
use letterpress_db::{DbConfig, DEFAULT_PORT};
use letterpress_pipeline::consumer::{ConsumerConfig, DEFAULT_MAX_MESSAGES};

const DEFAULT_COMFYUI_API_URL: &str = "http://127.0.0.1:8188";
const DEFAULT_COMFYUI_WS_URL: &str = "ws://127.0.0.1:8188";
const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;
const DEFAULT_FRAME_IDLE_TIMEOUT_SECS: u64 = 600;

/// Startup configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has invalid value '{value}'")]
    Invalid { name: &'static str, value: String },

    #[error("CREDENTIALS_ACCESS_KEY and CREDENTIALS_SECRET_KEY must be set together")]
    PartialCredentials,
}

/// Everything the worker needs to construct its collaborators.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub comfyui_api_url: String,
    pub comfyui_ws_url: String,
    pub queue_url: String,
    pub bucket: String,
    pub aws: AwsSettings,
    pub db: DbConfig,
    pub consumer: ConsumerConfig,
    pub receive_wait: Duration,
    /// `None` disables the per-frame idle timeout.
    pub frame_idle_timeout: Option<Duration>,
}

impl WorkerConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);

        let access_key_id = env.optional("CREDENTIALS_ACCESS_KEY");
        let secret_access_key = env.optional("CREDENTIALS_SECRET_KEY");
        if access_key_id.is_some() != secret_access_key.is_some() {
            return Err(ConfigError::PartialCredentials);
        }

        let max_messages: i32 = env.parsed("MAX_MESSAGES", DEFAULT_MAX_MESSAGES)?;
        let poll_secs: u64 = env.parsed("POLL_INTERVAL_SECS", DEFAULT_POLL_INTERVAL_SECS)?;
        if poll_secs == 0 {
            return Err(ConfigError::Invalid {
                name: "POLL_INTERVAL_SECS",
                value: poll_secs.to_string(),
            });
        }
        let idle_secs: u64 = env.parsed("FRAME_IDLE_TIMEOUT_SECS", DEFAULT_FRAME_IDLE_TIMEOUT_SECS)?;

        Ok(Self {
            comfyui_api_url: env
                .optional("COMFYUI_API_URL")
                .unwrap_or_else(|| DEFAULT_COMFYUI_API_URL.into()),
            comfyui_ws_url: env
                .optional("COMFYUI_WS_URL")
                .unwrap_or_else(|| DEFAULT_COMFYUI_WS_URL.into()),
            queue_url: env.required("AWS_QUEUE_URL")?,
            bucket: env.required("S3_BUCKET")?,
            aws: AwsSettings {
                region: env.optional("AWS_REGION"),
                access_key_id,
                secret_access_key,
            },
            db: DbConfig {
                host: env.required("host")?,
                port: env.parsed("DB_PORT", DEFAULT_PORT)?,
                database: env.required("db_name")?,
                user: env.required("user")?,
                password: env.required("password")?,
            },
            consumer: ConsumerConfig {
                poll_interval: Duration::from_secs(poll_secs),
                max_messages: max_messages.clamp(1, MAX_BATCH_SIZE),
            },
            receive_wait: Duration::from_secs(env.parsed("RECEIVE_WAIT_SECS", 0)?),
            frame_idle_timeout: (idle_secs > 0).then(|| Duration::from_secs(idle_secs)),
        })
    }
}

struct Env<F>(F);

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Present and non-blank.
    fn optional(&self, name: &str) -> Option<String> {
        (self.0)(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn required(&self, name: &'static str) -> Result<String, ConfigError> {
        self.optional(name).ok_or(ConfigError::Missing(name))
    }

    fn parsed<T: FromStr>(&self, name: &'static str, default: T) -> Result<T, ConfigError> {
        match self.optional(name) {
            None => Ok(default),
            Some(value) => value
                .parse()
                .map_err(|_| ConfigError::Invalid { name, value }),
        }
    }
}
