//! Semantic node roles.
//!
//! Templates mark the nodes a job needs to touch with a `_meta.title`.
//! [`RoleIndex`] resolves those titles to node identifiers once per
//! graph so the patcher never depends on node numbering.

use std::collections::HashMap;

use crate::error::CoreError;
use crate::graph::RenderGraph;

/// Whether a template must carry a node for a role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    Required,
    Optional,
}

/// A node role recognised by the patcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Positive prompt text encoder.
    Positive,
    /// Primary sampler.
    Sampler,
    /// Second sampler in two-pass templates.
    Sampler2,
    /// Character reference image loader.
    Character,
    /// Output node whose binary frames are the job's artifacts.
    SaveImage,
}

impl Role {
    pub const ALL: [Role; 5] = [
        Role::Positive,
        Role::Sampler,
        Role::Sampler2,
        Role::Character,
        Role::SaveImage,
    ];

    /// Title a template uses to tag a node with this role.
    pub fn title(self) -> &'static str {
        match self {
            Self::Positive => "Positive",
            Self::Sampler => "Sampler",
            Self::Sampler2 => "Sampler2",
            Self::Character => "Character",
            Self::SaveImage => "Save Image With S3 Upload",
        }
    }

    pub fn requirement(self) -> Requirement {
        match self {
            Self::Positive | Self::Sampler | Self::SaveImage => Requirement::Required,
            Self::Sampler2 | Self::Character => Requirement::Optional,
        }
    }

    pub fn is_required(self) -> bool {
        self.requirement() == Requirement::Required
    }

    /// Exact, case-sensitive match against [`Role::title`].
    pub fn from_title(title: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|role| role.title() == title)
    }
}

/// Role → node id table built from a single scan of a graph.
#[derive(Debug, Clone, Default)]
pub struct RoleIndex {
    nodes: HashMap<Role, String>,
}

impl RoleIndex {
    /// Scan `graph` in document order. When several nodes carry the
    /// same title the first one is kept.
    pub fn build(graph: &RenderGraph) -> Self {
        let mut nodes = HashMap::new();
        for (node_id, title) in graph.titles() {
            if let Some(role) = Role::from_title(title) {
                nodes.entry(role).or_insert_with(|| node_id.to_string());
            }
        }
        Self { nodes }
    }

    pub fn get(&self, role: Role) -> Option<&str> {
        self.nodes.get(&role).map(String::as_str)
    }

    /// Like [`get`](Self::get) but a missing role is an error.
    pub fn require(&self, role: Role) -> Result<&str, CoreError> {
        self.get(role).ok_or(CoreError::MissingRole { role })
    }

    /// Fail on the first required role the graph does not provide.
    pub fn check_required(&self) -> Result<(), CoreError> {
        Role::ALL
            .into_iter()
            .filter(|role| role.is_required())
            .try_for_each(|role| self.require(role).map(|_| ()))
    }
}
