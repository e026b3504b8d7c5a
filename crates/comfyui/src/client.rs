//! WebSocket client for connecting to a ComfyUI instance.
//!
//! [`ComfyUIClient`] holds the WebSocket base URL of one ComfyUI
//! server. Call [`ComfyUIClient::connect`] with a client id to open a
//! live [`ComfyUIConnection`].

use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

/// The raw WebSocket stream type used for ComfyUI connections.
pub type ComfyUIStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Configuration handle for a ComfyUI instance's event endpoint.
#[derive(Debug, Clone)]
pub struct ComfyUIClient {
    ws_url: String,
}

/// A live WebSocket connection to a ComfyUI instance.
pub struct ComfyUIConnection {
    /// Client ID sent during the WebSocket handshake.
    pub client_id: String,
    /// The raw WebSocket stream for reading/writing frames.
    pub ws_stream: ComfyUIStream,
}

impl ComfyUIClient {
    /// * `ws_url` - WebSocket base URL, e.g. `ws://host:8188`.
    pub fn new(ws_url: String) -> Self {
        Self { ws_url }
    }

    /// WebSocket base URL (e.g. `ws://host:8188`).
    pub fn ws_url(&self) -> &str {
        &self.ws_url
    }

    /// Full event-stream URL for a client id.
    pub fn stream_url(&self, client_id: &str) -> String {
        format!("{}/ws?clientId={}", self.ws_url.trim_end_matches('/'), client_id)
    }

    /// Connect to the ComfyUI WebSocket endpoint as `client_id`.
    ///
    /// ComfyUI addresses execution events to the client id given in the
    /// handshake, so the same id must be used when submitting.
    pub async fn connect(&self, client_id: &str) -> Result<ComfyUIConnection, ComfyUIClientError> {
        let url = self.stream_url(client_id);

        let (ws_stream, _response) = connect_async(url.as_str()).await.map_err(|e| {
            ComfyUIClientError::Connection(format!(
                "Failed to connect to ComfyUI at {}: {e}",
                self.ws_url
            ))
        })?;

        tracing::debug!(client_id = %client_id, "Connected to ComfyUI at {}", self.ws_url);

        Ok(ComfyUIConnection {
            client_id: client_id.to_string(),
            ws_stream,
        })
    }
}

/// Errors that can occur when opening the WebSocket.
#[derive(Debug, thiserror::Error)]
pub enum ComfyUIClientError {
    /// Failed to establish the initial WebSocket connection.
    #[error("Connection error: {0}")]
    Connection(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_url_carries_client_id() {
        let client = ComfyUIClient::new("ws://127.0.0.1:8188".into());
        assert_eq!(
            client.stream_url("abc"),
            "ws://127.0.0.1:8188/ws?clientId=abc"
        );
    }

    #[test]
    fn stream_url_tolerates_trailing_slash() {
        let client = ComfyUIClient::new("ws://host:8188/".into());
        assert_eq!(client.stream_url("x"), "ws://host:8188/ws?clientId=x");
    }

    #[tokio::test]
    async fn connect_to_closed_port_is_connection_error() {
        let client = ComfyUIClient::new("ws://127.0.0.1:1".into());
        let result = client.connect("c").await;
        assert!(matches!(result, Err(ComfyUIClientError::Connection(_))));
    }
}
