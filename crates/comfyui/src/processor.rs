//! WebSocket frame demultiplexer.
//!
//! Reads frames from a ComfyUI WebSocket connection until the watched
//! prompt finishes, collecting the binary payloads emitted while the
//! output node is executing.
//!
//! ComfyUI interleaves JSON control frames with binary frames. Binary
//! frames carry no prompt id of their own; they belong to whichever
//! node the most recent `executing` frame announced. Attribution is
//! therefore only granted while the latest announcement was for the
//! watched prompt.

use std::time::Duration;

use futures::{Stream, StreamExt};
use letterpress_core::job::ArtifactBatch;
use tokio_tungstenite::tungstenite::{self, Message};

use crate::messages::{message_type, parse_message, ComfyUIMessage};

/// Length of the header ComfyUI prepends to binary frames
/// (event type and image format, 4 bytes each).
pub const BINARY_HEADER_LEN: usize = 8;

/// Errors raised while draining the event stream.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// The socket closed before the prompt finished.
    #[error("Connection closed before prompt {prompt_id} finished")]
    ConnectionClosed { prompt_id: String },

    /// The socket failed while reading.
    #[error("WebSocket receive error: {0}")]
    Transport(#[from] tungstenite::Error),

    /// A frame needed for correct demultiplexing could not be decoded.
    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    /// ComfyUI reported an execution error for the watched prompt.
    #[error("Execution failed at node {node_id}: {exception_type}: {message}")]
    ExecutionFailed {
        node_id: String,
        exception_type: String,
        message: String,
    },

    /// The watched prompt was interrupted.
    #[error("Execution of prompt {prompt_id} was interrupted")]
    Interrupted { prompt_id: String },

    /// No frame arrived within the idle timeout.
    #[error("No frame received for {0:?}")]
    IdleTimeout(Duration),
}

/// Outcome of feeding one frame to the [`Demultiplexer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Continue,
    Finished,
}

/// Frame-by-frame state machine for one prompt.
#[derive(Debug)]
pub struct Demultiplexer {
    prompt_id: String,
    output_node: String,
    /// Node announced by the latest `executing` frame, if that frame was
    /// for the watched prompt.
    current_node: Option<String>,
    batch: ArtifactBatch,
}

impl Demultiplexer {
    pub fn new(prompt_id: impl Into<String>, output_node: impl Into<String>) -> Self {
        Self {
            prompt_id: prompt_id.into(),
            output_node: output_node.into(),
            current_node: None,
            batch: ArtifactBatch::new(),
        }
    }

    /// Consume one frame.
    pub fn feed(&mut self, frame: Message) -> Result<Step, StreamError> {
        match frame {
            Message::Text(text) => self.on_text(&text),
            Message::Binary(payload) => self.on_binary(payload),
            Message::Close(frame) => {
                tracing::warn!(prompt_id = %self.prompt_id, ?frame, "ComfyUI WebSocket closed");
                Err(StreamError::ConnectionClosed {
                    prompt_id: self.prompt_id.clone(),
                })
            }
            // Handled automatically by tungstenite.
            Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => Ok(Step::Continue),
        }
    }

    /// Artifacts collected so far.
    pub fn batch(&self) -> &ArtifactBatch {
        &self.batch
    }

    pub fn into_batch(self) -> ArtifactBatch {
        self.batch
    }

    fn on_text(&mut self, text: &str) -> Result<Step, StreamError> {
        let msg = match parse_message(text) {
            Ok(msg) => msg,
            Err(e) => return self.on_unparsed(text, e),
        };

        match msg {
            ComfyUIMessage::Executing(data) if data.prompt_id == self.prompt_id => {
                match data.node {
                    Some(node) => {
                        tracing::debug!(prompt_id = %self.prompt_id, node = %node, "Executing node");
                        self.current_node = Some(node);
                        Ok(Step::Continue)
                    }
                    None => {
                        tracing::debug!(
                            prompt_id = %self.prompt_id,
                            artifacts = self.batch.len(),
                            "Execution completed (all nodes done)",
                        );
                        Ok(Step::Finished)
                    }
                }
            }
            ComfyUIMessage::Executing(data) => {
                tracing::trace!(
                    prompt_id = %data.prompt_id,
                    watched = %self.prompt_id,
                    "Ignoring executing frame for another prompt",
                );
                self.current_node = None;
                Ok(Step::Continue)
            }
            ComfyUIMessage::ExecutionError(data) if data.prompt_id == self.prompt_id => {
                tracing::error!(
                    prompt_id = %data.prompt_id,
                    node_id = %data.node_id,
                    error_type = %data.exception_type,
                    error_message = %data.exception_message,
                    "Execution error",
                );
                Err(StreamError::ExecutionFailed {
                    node_id: data.node_id,
                    exception_type: data.exception_type,
                    message: data.exception_message,
                })
            }
            ComfyUIMessage::ExecutionInterrupted(data) if data.prompt_id == self.prompt_id => {
                Err(StreamError::Interrupted {
                    prompt_id: data.prompt_id,
                })
            }
            ComfyUIMessage::Progress(data) => {
                tracing::trace!(value = data.value, max = data.max, "Generation progress");
                Ok(Step::Continue)
            }
            other => {
                tracing::trace!(message = ?other, "Ignoring control frame");
                Ok(Step::Continue)
            }
        }
    }

    /// Unknown message kinds are skipped; a broken `executing` frame is
    /// fatal because completion could be missed.
    fn on_unparsed(&self, text: &str, error: serde_json::Error) -> Result<Step, StreamError> {
        match message_type(text).as_deref() {
            Some("executing") => Err(StreamError::MalformedFrame(format!(
                "executing frame: {error}"
            ))),
            kind => {
                tracing::debug!(kind = ?kind, error = %error, "Skipping unrecognised ComfyUI frame");
                Ok(Step::Continue)
            }
        }
    }

    fn on_binary(&mut self, payload: Vec<u8>) -> Result<Step, StreamError> {
        let is_output = self.current_node.as_deref() == Some(self.output_node.as_str());
        if !is_output {
            tracing::trace!(len = payload.len(), "Ignoring binary frame outside output node");
            return Ok(Step::Continue);
        }

        if payload.len() < BINARY_HEADER_LEN {
            return Err(StreamError::MalformedFrame(format!(
                "binary frame of {} bytes is shorter than its {BINARY_HEADER_LEN}-byte header",
                payload.len()
            )));
        }

        let image = payload[BINARY_HEADER_LEN..].to_vec();
        tracing::debug!(
            prompt_id = %self.prompt_id,
            node = %self.output_node,
            bytes = image.len(),
            "Received artifact frame",
        );
        self.batch.push(&self.output_node, image);
        Ok(Step::Continue)
    }
}

/// Drain `stream` until `prompt_id` finishes, returning the artifacts
/// produced by `output_node`.
///
/// With `idle_timeout` set, waiting longer than that for any single
/// frame fails with [`StreamError::IdleTimeout`].
pub async fn collect_artifacts<S>(
    stream: &mut S,
    prompt_id: &str,
    output_node: &str,
    idle_timeout: Option<Duration>,
) -> Result<ArtifactBatch, StreamError>
where
    S: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
{
    let mut demux = Demultiplexer::new(prompt_id, output_node);

    loop {
        let next = match idle_timeout {
            Some(limit) => tokio::time::timeout(limit, stream.next())
                .await
                .map_err(|_| StreamError::IdleTimeout(limit))?,
            None => stream.next().await,
        };

        let frame = match next {
            Some(frame) => frame?,
            None => {
                return Err(StreamError::ConnectionClosed {
                    prompt_id: prompt_id.to_string(),
                })
            }
        };

        if demux.feed(frame)? == Step::Finished {
            return Ok(demux.into_batch());
        }
    }
}
