//! ComfyUI WebSocket and REST client library.
//!
//! Provides typed message parsing, WebSocket connection setup, the
//! `/prompt` submission wrapper and the stream demultiplexer that turns
//! one execution's frames into an [`ArtifactBatch`](letterpress_core::job::ArtifactBatch).

pub mod api;
pub mod client;
pub mod messages;
pub mod processor;
pub mod render;
