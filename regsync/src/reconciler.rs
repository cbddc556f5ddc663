//! Reconciler that plans and executes the convergence of the target
//! system's OAuth clients on the directory's listing

use std::collections::{HashMap, HashSet};

use tracing::{debug, info, warn};

use regsync_core::api::Result as ApiResult;
use regsync_core::{AdminApi, DirectoryClient, MutationOutcome, OAuthClient};

use crate::error::Result;
use crate::mapper::merge;
use crate::metrics::PassMetrics;
use crate::plan::{Compensation, PlanSummary, SyncAction, SyncPlan};
use crate::policy::{Scope, ScopeFilter, SyncPolicy};

/// Plans and executes one reconciliation pass.
pub struct Reconciler {
    policy: SyncPolicy,
    filter: ScopeFilter,
    /// Base record new clients start from.
    template: OAuthClient,
}

impl Reconciler {
    /// Compile the policy. Fails when a filter pattern is not a valid
    /// regular expression.
    pub fn new(policy: SyncPolicy, template: OAuthClient) -> Result<Self> {
        let filter = ScopeFilter::new(&policy)?;
        let conflicting = filter.conflicting_ids();
        if !conflicting.is_empty() {
            warn!(
                "Ids present in both the ignore and disabled lists are never touched: {}",
                conflicting.join(", ")
            );
        }
        Ok(Self {
            policy,
            filter,
            template,
        })
    }

    /// Compute the ordered mutation plan for one pass.
    ///
    /// Deactivations come first so a client revoked by the directory goes
    /// dark before any other work, then creations and updates in directory
    /// order, then the sweep for clients the directory no longer lists at
    /// all. The planner performs no I/O and emits only mutations; records
    /// that need nothing are counted in the summary instead.
    pub fn plan(&self, directory: &[DirectoryClient], existing: &[OAuthClient]) -> SyncPlan {
        let mut actions = Vec::new();
        let mut summary = PlanSummary::default();

        let by_id: HashMap<&str, &OAuthClient> = existing
            .iter()
            .map(|client| (client.client_id.as_str(), client))
            .collect();
        let snapshot_ids: HashSet<&str> = directory
            .iter()
            .map(|record| record.client_id.as_str())
            .collect();

        if self.policy.force_resync {
            warn!("Force resync is on; every in-scope client will be rewritten");
        }

        let (deactivations, activations): (Vec<&DirectoryClient>, Vec<&DirectoryClient>) =
            directory.iter().partition(|record| {
                !record.is_active() || self.filter.is_force_disabled(&record.client_id)
            });

        for record in deactivations {
            self.plan_deactivation(record, &by_id, &mut actions, &mut summary);
        }
        for record in activations {
            self.plan_activation(record, &by_id, &mut actions, &mut summary);
        }
        self.plan_sweep(existing, &snapshot_ids, &mut actions, &mut summary);

        SyncPlan { actions, summary }
    }

    fn plan_deactivation(
        &self,
        record: &DirectoryClient,
        by_id: &HashMap<&str, &OAuthClient>,
        actions: &mut Vec<SyncAction>,
        summary: &mut PlanSummary,
    ) {
        let id = record.client_id.as_str();
        if self.skip_out_of_scope(id, summary) {
            return;
        }

        let Some(current) = by_id.get(id) else {
            debug!("Client {} is not in the target system, nothing to deactivate", id);
            summary.unchanged += 1;
            return;
        };

        if self.policy.delete_instead_of_disable {
            info!("Client {} is no longer active in the directory and will be deleted", id);
            actions.push(SyncAction::Delete {
                client_id: id.to_string(),
            });
            summary.deletes += 1;
            return;
        }

        if !current.enabled {
            debug!("Client {} is already disabled, skipping", id);
            summary.unchanged += 1;
            return;
        }

        let mut record = record.clone();
        if self.filter.is_force_disabled(id) && record.is_active() {
            warn!(
                "Client {} is on the disabled list and will be held disabled despite its directory status",
                id
            );
            record.status = "Inactive".to_string();
        } else {
            info!("Client {} is no longer active in the directory and will be disabled", id);
        }

        let merged = merge(current, &record, &self.policy.claims_mapping);
        actions.push(SyncAction::Disable {
            client_id: id.to_string(),
            client: merged,
        });
        summary.disables += 1;
    }

    fn plan_activation(
        &self,
        record: &DirectoryClient,
        by_id: &HashMap<&str, &OAuthClient>,
        actions: &mut Vec<SyncAction>,
        summary: &mut PlanSummary,
    ) {
        let id = record.client_id.as_str();
        if self.skip_out_of_scope(id, summary) {
            return;
        }

        if record.redirect_uris.is_empty() {
            warn!("Client {} has no redirect URIs and cannot be registered, skipping", id);
            summary.invalid += 1;
            return;
        }
        if record.grant_types.is_empty() {
            warn!("Client {} has no grant types and cannot be registered, skipping", id);
            summary.invalid += 1;
            return;
        }

        let Some(current) = by_id.get(id) else {
            info!("Client {} does not exist in the target system, creating", id);
            let client = merge(&self.template, record, &self.policy.claims_mapping);
            actions.push(SyncAction::Create { client });
            summary.creates += 1;
            return;
        };

        let fresh = record_watermark(record);
        if !self.policy.force_resync && current.enabled && current.watermark() == fresh {
            debug!("Client {} is up to date, skipping", id);
            summary.unchanged += 1;
            return;
        }

        if !current.enabled {
            info!("Client {} is disabled in the target system and will be re-enabled", id);
        } else if current.watermark() == fresh {
            info!("Client {} is being rewritten by force resync", id);
        } else {
            info!(
                "Client {} changed in the directory ({:?} -> {:?}), updating",
                id,
                current.watermark(),
                fresh
            );
        }

        let merged = merge(current, record, &self.policy.claims_mapping);
        actions.push(SyncAction::Update {
            client_id: id.to_string(),
            client: merged,
            on_failure: self.compensation_for(current),
        });
        summary.updates += 1;
    }

    /// Deal with directory-managed clients that have vanished from the
    /// directory listing altogether.
    fn plan_sweep(
        &self,
        existing: &[OAuthClient],
        snapshot_ids: &HashSet<&str>,
        actions: &mut Vec<SyncAction>,
        summary: &mut PlanSummary,
    ) {
        for current in existing {
            let id = current.client_id.as_str();
            if !current.is_directory_managed() || snapshot_ids.contains(id) {
                continue;
            }
            if self.skip_out_of_scope(id, summary) {
                continue;
            }

            if self.policy.delete_instead_of_disable {
                warn!("Client {} has vanished from the directory and will be deleted", id);
                actions.push(SyncAction::Delete {
                    client_id: id.to_string(),
                });
                summary.deletes += 1;
            } else if current.enabled {
                warn!("Client {} has vanished from the directory and will be disabled", id);
                let mut disabled = current.clone();
                disabled.enabled = false;
                actions.push(SyncAction::Disable {
                    client_id: id.to_string(),
                    client: disabled,
                });
                summary.disables += 1;
            } else {
                debug!("Client {} has vanished from the directory but is already disabled", id);
                summary.unchanged += 1;
            }
        }
    }

    fn skip_out_of_scope(&self, id: &str, summary: &mut PlanSummary) -> bool {
        match self.filter.classify(id) {
            Scope::InScope => false,
            Scope::OutOfScopeFiltered => {
                debug!("Client {} does not match any filter pattern, skipping", id);
                summary.filtered += 1;
                true
            }
            Scope::Ignored => {
                warn!("Client {} is on the ignore list, no changes will be made", id);
                summary.ignored += 1;
                true
            }
        }
    }

    fn compensation_for(&self, current: &OAuthClient) -> Compensation {
        if self.policy.delete_instead_of_disable {
            Compensation::Delete
        } else {
            let mut fallback = current.clone();
            fallback.enabled = false;
            Compensation::Disable(Box::new(fallback))
        }
    }

    /// Execute a plan sequentially, in plan order.
    ///
    /// One failed mutation never aborts the pass. A failed update
    /// additionally triggers its compensation right away, so the client is
    /// left disabled or removed rather than enabled in an unknown state.
    pub async fn apply(&self, plan: &SyncPlan, admin: &dyn AdminApi) -> PassMetrics {
        let mut metrics = PassMetrics::new();
        info!(
            "Applying {} actions (pass {})",
            plan.actions.len(),
            metrics.pass_id
        );

        for action in &plan.actions {
            match action {
                SyncAction::Create { client } => {
                    if confirmed(admin.create_client(client).await, "create", &client.client_id) {
                        metrics.created += 1;
                    } else {
                        metrics.failed += 1;
                    }
                }
                SyncAction::Update {
                    client_id,
                    client,
                    on_failure,
                } => {
                    if confirmed(admin.update_client(client_id, client).await, "update", client_id)
                    {
                        metrics.updated += 1;
                    } else {
                        metrics.failed += 1;
                        self.compensate(client_id, on_failure, admin, &mut metrics).await;
                    }
                }
                SyncAction::Disable { client_id, client } => {
                    if confirmed(admin.update_client(client_id, client).await, "disable", client_id)
                    {
                        metrics.disabled += 1;
                    } else {
                        metrics.failed += 1;
                    }
                }
                SyncAction::Delete { client_id } => {
                    if confirmed(admin.delete_client(client_id).await, "delete", client_id) {
                        metrics.deleted += 1;
                    } else {
                        metrics.failed += 1;
                    }
                }
            }
        }

        metrics.complete();
        info!("{}", metrics.summary());
        metrics
    }

    async fn compensate(
        &self,
        client_id: &str,
        on_failure: &Compensation,
        admin: &dyn AdminApi,
        metrics: &mut PassMetrics,
    ) {
        match on_failure {
            Compensation::None => {}
            Compensation::Delete => {
                warn!(
                    "Update of client {} failed; deleting it so it cannot run with stale settings",
                    client_id
                );
                if confirmed(admin.delete_client(client_id).await, "compensating delete", client_id)
                {
                    metrics.compensated += 1;
                }
            }
            Compensation::Disable(fallback) => {
                warn!(
                    "Update of client {} failed; disabling it so it cannot run with stale settings",
                    client_id
                );
                if confirmed(
                    admin.update_client(client_id, fallback).await,
                    "compensating disable",
                    client_id,
                ) {
                    metrics.compensated += 1;
                }
            }
        }
    }
}

/// The directory-side watermark, normalized the same way the stored one
/// is: an empty `last_updated` counts as absent.
fn record_watermark(record: &DirectoryClient) -> Option<&str> {
    record
        .last_updated
        .as_deref()
        .filter(|value| !value.is_empty())
}

fn confirmed(result: ApiResult<MutationOutcome>, what: &str, client_id: &str) -> bool {
    match result {
        Ok(outcome) if outcome.ok => true,
        Ok(outcome) => {
            warn!(
                "{} of client {} was rejected with HTTP {}; will retry on a later pass",
                what, client_id, outcome.status
            );
            false
        }
        Err(error) => {
            warn!(
                "{} of client {} failed: {}; will retry on a later pass",
                what, client_id, error
            );
            false
        }
    }
}
