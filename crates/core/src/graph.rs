//! Render-graph model.
//!
//! A render graph is the ComfyUI API-format workflow: a JSON object
//! whose keys are node identifiers and whose values are node records of
//! the shape
//!
//! ```json
//! "6": {
//!     "class_type": "CLIPTextEncode",
//!     "_meta": { "title": "Positive" },
//!     "inputs": { "text": "sitting", "clip": ["4", 1] }
//! }
//! ```
//!
//! Only `_meta.title` and `inputs` are interpreted here. Every other
//! field is carried through untouched so the backend receives the
//! template exactly as authored, apart from the patched inputs.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::CoreError;

/// Key of the metadata object holding a node's title.
pub const META_KEY: &str = "_meta";
/// Key of the title string inside [`META_KEY`].
pub const TITLE_KEY: &str = "title";
/// Key of the node's input map.
pub const INPUTS_KEY: &str = "inputs";

/// A validated render graph.
///
/// Node order follows the source document, so "first match wins" role
/// lookups are stable for a given template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Map<String, Value>", into = "Map<String, Value>")]
pub struct RenderGraph {
    nodes: Map<String, Value>,
}

impl RenderGraph {
    /// Number of nodes in the graph.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterate `(node_id, title)` pairs in document order. Nodes without
    /// a string title are skipped.
    pub fn titles(&self) -> impl Iterator<Item = (&str, &str)> {
        self.nodes.iter().filter_map(|(id, node)| {
            node.get(META_KEY)
                .and_then(|meta| meta.get(TITLE_KEY))
                .and_then(Value::as_str)
                .map(|title| (id.as_str(), title))
        })
    }

    /// Look up one input value of a node.
    pub fn input(&self, node_id: &str, field: &str) -> Option<&Value> {
        self.nodes.get(node_id)?.get(INPUTS_KEY)?.get(field)
    }

    /// Whether the graph contains `node_id`.
    pub fn contains(&self, node_id: &str) -> bool {
        self.nodes.contains_key(node_id)
    }

    /// Mutable access to a node's input map, creating an empty one if
    /// the node has no `inputs` yet. Returns `None` for unknown nodes.
    pub fn inputs_mut(&mut self, node_id: &str) -> Option<&mut Map<String, Value>> {
        let node = self.nodes.get_mut(node_id)?.as_object_mut()?;
        node.entry(INPUTS_KEY)
            .or_insert_with(|| Value::Object(Map::new()))
            .as_object_mut()
    }

    /// Borrow the raw JSON node map (for submission).
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.nodes
    }
}

impl TryFrom<Map<String, Value>> for RenderGraph {
    type Error = CoreError;

    /// Validate node shape: every node must be an object, and `_meta`
    /// and `inputs`, when present, must be objects too.
    fn try_from(nodes: Map<String, Value>) -> Result<Self, Self::Error> {
        for (id, node) in &nodes {
            let obj = node
                .as_object()
                .ok_or_else(|| CoreError::Malformed(format!("node '{id}' is not an object")))?;

            for key in [META_KEY, INPUTS_KEY] {
                if let Some(value) = obj.get(key) {
                    if !value.is_object() {
                        return Err(CoreError::Malformed(format!(
                            "node '{id}' has a non-object '{key}' field"
                        )));
                    }
                }
            }
        }
        Ok(Self { nodes })
    }
}

impl TryFrom<Value> for RenderGraph {
    type Error = CoreError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) => map.try_into(),
            other => Err(CoreError::Malformed(format!(
                "render graph must be a JSON object, got {}",
                json_kind(&other)
            ))),
        }
    }
}

impl From<RenderGraph> for Map<String, Value> {
    fn from(graph: RenderGraph) -> Self {
        graph.nodes
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
