//! Render-graph patcher.
//!
//! Applies a list of [`Binding`]s to a template, each binding naming a
//! role, an input field and how to compute the new value. Role lookup
//! goes through [`RoleIndex`], so bindings survive template
//! renumbering.
//!
//! The graph is mutated in place. Templates are usually shared between
//! many jobs, so callers clone before patching.

use rand::Rng;
use serde_json::Value;

use crate::error::CoreError;
use crate::graph::RenderGraph;
use crate::job::JobDescriptor;
use crate::roles::{Role, RoleIndex};

/// Seeds are drawn from `0..SEED_UPPER_BOUND`.
pub const SEED_UPPER_BOUND: u64 = 1_000_000;

/// How a binding computes the new field value.
#[derive(Debug, Clone, PartialEq)]
pub enum BindingValue {
    /// Prepend to the field's existing string value.
    Prepend(String),
    /// Overwrite the field.
    Set(Value),
    /// Overwrite the field with a fresh random seed, drawn
    /// independently for every binding.
    RandomSeed,
}

/// One field assignment on the node that carries `role`.
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub role: Role,
    pub field: &'static str,
    pub value: BindingValue,
}

impl Binding {
    pub fn new(role: Role, field: &'static str, value: BindingValue) -> Self {
        Self { role, field, value }
    }
}

/// What a successful patch resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchReport {
    /// Node id of the [`Role::SaveImage`] node.
    pub output_node: String,
    /// Seeds assigned, in binding order.
    pub seeds: Vec<(Role, u64)>,
}

impl PatchReport {
    pub fn seed_for(&self, role: Role) -> Option<u64> {
        self.seeds.iter().find(|(r, _)| *r == role).map(|(_, s)| *s)
    }
}

/// The standard bindings for a letter-image job.
///
/// The character binding is only emitted when the job names a
/// character.
pub fn bindings_for(job: &JobDescriptor) -> Vec<Binding> {
    let mut bindings = vec![
        Binding::new(
            Role::Positive,
            "text",
            BindingValue::Prepend(job.keywords.clone()),
        ),
        Binding::new(
            Role::SaveImage,
            "filename_prefix",
            BindingValue::Set(Value::String(job.job_id.clone())),
        ),
        Binding::new(Role::Sampler, "seed", BindingValue::RandomSeed),
        Binding::new(Role::Sampler2, "seed", BindingValue::RandomSeed),
    ];

    if let Some(character_id) = &job.character_id {
        bindings.push(Binding::new(
            Role::Character,
            "image",
            BindingValue::Set(Value::String(format!("{character_id}.jpg"))),
        ));
    }

    bindings
}

/// Apply `bindings` to `graph`.
///
/// Fails before touching the graph when a required role is missing or
/// a prepend target is not a string. Bindings for absent optional roles
/// are skipped.
pub fn patch<R: Rng>(
    graph: &mut RenderGraph,
    bindings: &[Binding],
    rng: &mut R,
) -> Result<PatchReport, CoreError> {
    let index = RoleIndex::build(graph);
    index.check_required()?;

    let mut plan = Vec::with_capacity(bindings.len());
    for binding in bindings {
        let node_id = match index.get(binding.role) {
            Some(id) => id,
            None if binding.role.is_required() => {
                return Err(CoreError::MissingRole { role: binding.role })
            }
            None => continue,
        };

        if matches!(binding.value, BindingValue::Prepend(_))
            && !matches!(graph.input(node_id, binding.field), Some(Value::String(_)))
        {
            return Err(missing_field(binding, node_id));
        }

        plan.push((binding, node_id.to_string()));
    }

    let output_node = index.require(Role::SaveImage)?.to_string();
    let mut seeds = Vec::new();

    for (binding, node_id) in plan {
        let inputs = graph
            .inputs_mut(&node_id)
            .ok_or_else(|| missing_field(binding, &node_id))?;

        let value = match &binding.value {
            BindingValue::Prepend(prefix) => {
                let existing = inputs
                    .get(binding.field)
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                Value::String(format!("{prefix}{existing}"))
            }
            BindingValue::Set(value) => value.clone(),
            BindingValue::RandomSeed => {
                let seed = rng.random_range(0..SEED_UPPER_BOUND);
                seeds.push((binding.role, seed));
                Value::from(seed)
            }
        };

        inputs.insert(binding.field.to_string(), value);
    }

    Ok(PatchReport { output_node, seeds })
}

fn missing_field(binding: &Binding, node_id: &str) -> CoreError {
    CoreError::MissingField {
        role: binding.role,
        node_id: node_id.to_string(),
        field: binding.field,
    }
}
