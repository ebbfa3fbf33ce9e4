//! Action types for cloud resource management

use crate::provider::ResourceSet;
use crate::state::AppliedState;
use serde::{Deserialize, Serialize};

/// Represents a planned action for a cloud resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    /// Unique identifier for the action
    pub id: String,

    /// Type of action to perform
    pub action_type: ActionType,

    /// Resource type (e.g., "scalable-fleet", "key-pair")
    pub resource_type: String,

    /// Resource identifier
    pub resource_id: String,

    /// Description of the action
    pub description: String,
}

impl Action {
    fn new(action_type: ActionType, resource_type: &str, resource_id: &str) -> Self {
        let description = match action_type {
            ActionType::Create => format!("create {} {}", resource_type, resource_id),
            ActionType::Update => format!("update {} {}", resource_type, resource_id),
            ActionType::Delete => format!("delete {} {}", resource_type, resource_id),
            ActionType::NoOp => format!("{} {} is up to date", resource_type, resource_id),
        };
        Self {
            id: format!("{}-{}:{}", action_type, resource_type, resource_id),
            action_type,
            resource_type: resource_type.to_string(),
            resource_id: resource_id.to_string(),
            description,
        }
    }
}

/// Type of action to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// Create a new resource
    Create,
    /// Update an existing resource
    Update,
    /// Delete a resource
    Delete,
    /// No changes needed
    NoOp,
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionType::Create => write!(f, "create"),
            ActionType::Update => write!(f, "update"),
            ActionType::Delete => write!(f, "delete"),
            ActionType::NoOp => write!(f, "no-op"),
        }
    }
}

/// Plan containing all actions to be applied
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    /// List of actions to perform
    pub actions: Vec<Action>,

    /// Whether the plan has any changes
    pub has_changes: bool,
}

impl Plan {
    pub fn new(actions: Vec<Action>) -> Self {
        let has_changes = actions.iter().any(|a| a.action_type != ActionType::NoOp);
        Self {
            actions,
            has_changes,
        }
    }

    pub fn empty() -> Self {
        Self {
            actions: Vec::new(),
            has_changes: false,
        }
    }

    /// Diff the desired resource set against the last applied state.
    ///
    /// Resources are compared by key and request payload. Anything recorded
    /// in the state but absent from the desired set is planned for deletion.
    pub fn diff(desired: &ResourceSet, current: &AppliedState) -> Self {
        let mut keys: Vec<&String> = desired.resources.keys().collect();
        keys.sort();

        let mut actions = Vec::new();
        for key in keys {
            let resource = &desired.resources[key];
            let action_type = match current.get_resource(key) {
                None => ActionType::Create,
                Some(existing) if existing.config != resource.config => ActionType::Update,
                Some(_) => ActionType::NoOp,
            };
            actions.push(Action::new(action_type, &resource.resource_type, &resource.id));
        }

        let mut stale: Vec<_> = current
            .resources
            .iter()
            .filter(|(key, _)| !desired.resources.contains_key(*key))
            .collect();
        stale.sort_by(|a, b| a.0.cmp(b.0));
        for (_, state) in stale {
            actions.push(Action::new(
                ActionType::Delete,
                &state.resource_type,
                &state.id,
            ));
        }

        Self::new(actions)
    }

    /// Get actions by type
    pub fn actions_by_type(&self, action_type: ActionType) -> Vec<&Action> {
        self.actions
            .iter()
            .filter(|a| a.action_type == action_type)
            .collect()
    }

    /// Summary of the plan
    pub fn summary(&self) -> PlanSummary {
        PlanSummary {
            create: self.actions_by_type(ActionType::Create).len(),
            update: self.actions_by_type(ActionType::Update).len(),
            delete: self.actions_by_type(ActionType::Delete).len(),
            no_change: self.actions_by_type(ActionType::NoOp).len(),
        }
    }
}

/// Summary of planned actions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanSummary {
    pub create: usize,
    pub update: usize,
    pub delete: usize,
    pub no_change: usize,
}

impl std::fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} to create, {} to update, {} to delete, {} unchanged",
            self.create, self.update, self.delete, self.no_change
        )
    }
}
