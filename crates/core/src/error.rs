use crate::roles::Role;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// A required role is absent from the render-graph template.
    #[error("Render graph has no node titled '{}' (required role {role:?})", .role.title())]
    MissingRole { role: Role },

    /// A role node exists but lacks the input field a binding targets.
    #[error("Node '{node_id}' ({role:?}) has no usable input field '{field}'")]
    MissingField {
        role: Role,
        node_id: String,
        field: &'static str,
    },

    /// The queue message body could not be turned into a job descriptor.
    #[error("Malformed job descriptor: {0}")]
    Malformed(String),
}

impl CoreError {
    /// Whether this error stems from the template itself rather than the
    /// shape of the message carrying it.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::MissingRole { .. } | Self::MissingField { .. })
    }
}
