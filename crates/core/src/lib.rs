//! Domain types and pure logic for the letter-image worker.
//!
//! Holds the render-graph model, semantic role lookup, the graph
//! patcher, queue job descriptors and artifact key naming. Nothing in
//! this crate performs I/O.

pub mod error;
pub mod graph;
pub mod job;
pub mod naming;
pub mod patch;
pub mod roles;
