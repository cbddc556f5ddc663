//! Mutation plans produced by a reconciliation pass

use serde::{Deserialize, Serialize};

use regsync_core::OAuthClient;

/// A single mutation the target system needs in order to converge on the
/// directory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum SyncAction {
    /// Register a client the directory lists but the target lacks.
    Create { client: OAuthClient },
    /// Rewrite an existing client from its directory record.
    Update {
        client_id: String,
        client: OAuthClient,
        /// Applied when the update cannot be confirmed, so a client is
        /// never left half-updated but enabled.
        on_failure: Compensation,
    },
    /// Push the client with `enabled` off. Used both for records the
    /// directory no longer lists as active and for the orphan sweep.
    Disable {
        client_id: String,
        client: OAuthClient,
    },
    /// Remove the client from the target system.
    Delete { client_id: String },
}

impl SyncAction {
    pub fn client_id(&self) -> &str {
        match self {
            SyncAction::Create { client } => &client.client_id,
            SyncAction::Update { client_id, .. }
            | SyncAction::Disable { client_id, .. }
            | SyncAction::Delete { client_id } => client_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            SyncAction::Create { .. } => "create",
            SyncAction::Update { .. } => "update",
            SyncAction::Disable { .. } => "disable",
            SyncAction::Delete { .. } => "delete",
        }
    }
}

/// Fail-safe follow-up for an update that could not be confirmed.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub enum Compensation {
    /// Nothing to do; the action is already safe to fail.
    #[default]
    None,
    /// Remove the client outright.
    Delete,
    /// Push the pre-update record with `enabled` forced off.
    Disable(Box<OAuthClient>),
}

/// Ordered mutations for one pass plus counters for everything the
/// planner looked at and left alone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncPlan {
    /// Actions in execution order: deactivations first, then creates and
    /// updates, then the orphan sweep.
    pub actions: Vec<SyncAction>,
    /// Summary statistics
    pub summary: PlanSummary,
}

impl SyncPlan {
    /// True when the target already matches the directory.
    pub fn is_converged(&self) -> bool {
        self.actions.is_empty()
    }
}

/// Summary of a sync plan
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PlanSummary {
    pub creates: usize,
    pub updates: usize,
    pub disables: usize,
    pub deletes: usize,
    /// Records already converged, including already-disabled ones.
    pub unchanged: usize,
    /// Records skipped because their identifier is on the ignore list.
    pub ignored: usize,
    /// Records skipped because their identifier is outside the filter.
    pub filtered: usize,
    /// Active records rejected for missing redirect URIs or grant types.
    pub invalid: usize,
}

impl PlanSummary {
    pub fn total_actions(&self) -> usize {
        self.creates + self.updates + self.disables + self.deletes
    }

    pub fn describe(&self) -> String {
        format!(
            "planned {} actions ({} creates, {} updates, {} disables, {} deletes); \
             {} unchanged, {} ignored, {} filtered out, {} invalid",
            self.total_actions(),
            self.creates,
            self.updates,
            self.disables,
            self.deletes,
            self.unchanged,
            self.ignored,
            self.filtered,
            self.invalid
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_accessors_cover_every_variant() {
        let client = OAuthClient {
            client_id: "c1".to_string(),
            ..Default::default()
        };

        let actions = [
            SyncAction::Create {
                client: client.clone(),
            },
            SyncAction::Update {
                client_id: "c1".to_string(),
                client: client.clone(),
                on_failure: Compensation::None,
            },
            SyncAction::Disable {
                client_id: "c1".to_string(),
                client,
            },
            SyncAction::Delete {
                client_id: "c1".to_string(),
            },
        ];

        let kinds: Vec<_> = actions.iter().map(|a| a.kind()).collect();
        assert_eq!(kinds, ["create", "update", "disable", "delete"]);
        assert!(actions.iter().all(|a| a.client_id() == "c1"));
    }

    #[test]
    fn summary_counts_only_mutations_as_actions() {
        let summary = PlanSummary {
            creates: 2,
            updates: 1,
            disables: 1,
            deletes: 0,
            unchanged: 7,
            ignored: 1,
            filtered: 3,
            invalid: 1,
        };
        assert_eq!(summary.total_actions(), 4);
        let text = summary.describe();
        assert!(text.contains("4 actions"));
        assert!(text.contains("7 unchanged"));
    }
}
