//! Letter-image job pipeline.
//!
//! [`consumer::JobConsumer`] drives each queued job through patching,
//! rendering, artifact upload and status recording, and decides when
//! the queue message may be acknowledged. Collaborators are injected
//! through the traits in [`ports`].

pub mod adapters;
pub mod consumer;
pub mod error;
pub mod ports;
