//! REST API client for the ComfyUI HTTP endpoints.
//!
//! Wraps workflow submission (`POST /prompt`) using [`reqwest`].

use serde::Deserialize;
use serde_json::{Map, Value};

/// HTTP client for a single ComfyUI instance.
#[derive(Clone)]
pub struct ComfyUIApi {
    client: reqwest::Client,
    api_url: String,
}

/// Response returned by the ComfyUI `/prompt` endpoint after queuing a
/// workflow.
#[derive(Debug, Deserialize)]
pub struct SubmitResponse {
    /// Server-assigned identifier for the queued prompt.
    pub prompt_id: String,
    /// Position in the execution queue.
    #[serde(default)]
    pub number: i64,
    /// Per-node validation errors. Empty when the graph was accepted.
    #[serde(default)]
    pub node_errors: Map<String, Value>,
}

/// Errors from the ComfyUI REST API layer.
#[derive(Debug, thiserror::Error)]
pub enum ComfyUIApiError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// ComfyUI returned a non-2xx status code.
    #[error("ComfyUI API error ({status}): {body}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// ComfyUI accepted the request but reported invalid nodes.
    #[error("ComfyUI rejected nodes: {}", nodes.join(", "))]
    NodeErrors {
        prompt_id: String,
        nodes: Vec<String>,
    },
}

impl ComfyUIApi {
    /// Create a new API client for a ComfyUI instance.
    ///
    /// * `api_url` - Base HTTP URL, e.g. `http://host:8188`.
    pub fn new(api_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url,
        }
    }

    /// Create an API client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, api_url: String) -> Self {
        Self { client, api_url }
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Submit a workflow for execution.
    ///
    /// Sends `POST /prompt` with the workflow and client ID. A response
    /// carrying non-empty `node_errors` is turned into
    /// [`ComfyUIApiError::NodeErrors`].
    pub async fn submit_workflow(
        &self,
        workflow: &Map<String, Value>,
        client_id: &str,
    ) -> Result<SubmitResponse, ComfyUIApiError> {
        let body = serde_json::json!({
            "prompt": workflow,
            "client_id": client_id,
        });

        let response = self
            .client
            .post(format!("{}/prompt", self.api_url))
            .json(&body)
            .send()
            .await?;

        let submitted: SubmitResponse = Self::parse_response(response).await?;
        check_node_errors(submitted)
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or a [`ComfyUIApiError::ApiError`]
    /// containing the status and body text on failure.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, ComfyUIApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ComfyUIApiError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ComfyUIApiError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }
}

fn check_node_errors(response: SubmitResponse) -> Result<SubmitResponse, ComfyUIApiError> {
    if response.node_errors.is_empty() {
        return Ok(response);
    }
    Err(ComfyUIApiError::NodeErrors {
        prompt_id: response.prompt_id,
        nodes: response.node_errors.keys().cloned().collect(),
    })
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn response(json: &str) -> SubmitResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn accepted_submission_passes_through() {
        let r = response(r#"{"prompt_id":"p-1","number":4,"node_errors":{}}"#);
        let r = check_node_errors(r).unwrap();
        assert_eq!(r.prompt_id, "p-1");
        assert_eq!(r.number, 4);
    }

    #[test]
    fn missing_node_errors_means_accepted() {
        let r = response(r#"{"prompt_id":"p-2"}"#);
        assert!(check_node_errors(r).is_ok());
    }

    #[test]
    fn node_errors_reject_submission() {
        let r = response(
            r#"{"prompt_id":"p-3","number":0,"node_errors":{"9":{"errors":[{"type":"value_not_in_list"}]}}}"#,
        );
        assert_matches!(
            check_node_errors(r),
            Err(ComfyUIApiError::NodeErrors { prompt_id, nodes }) if prompt_id == "p-3" && nodes == vec!["9"]
        );
    }
}
