//! Drives reconciliation passes from a loaded configuration.

use anyhow::Result;
use regsync::{PassMetrics, Reconciler, SyncPlan};
use regsync_core::{AdminApi, AdminClient, DirectoryApi, OAuthClient, TargetSettings};
use tracing::{error, info, warn};

use crate::config::AppConfig;

/// Runs one full pass: snapshot both sides, plan, apply.
pub async fn run_pass(config: &AppConfig) -> Result<PassMetrics> {
    let template = load_template(&config.target).await?;
    let reconciler = Reconciler::new(config.policy.clone(), template)?;

    let directory = DirectoryApi::connect(config.directory.clone()).await?;
    let admin = AdminClient::connect(&config.target)?;

    let records = directory.fetch_authoritative().await?;
    let existing = admin.list_clients().await?;

    let plan = reconciler.plan(&records, &existing);
    info!("{}", plan.summary.describe());

    let metrics = reconciler.apply(&plan, &admin).await;
    info!("{}", metrics.summary());
    Ok(metrics)
}

/// Single pass or an endless loop, depending on `repeat`. In loop mode a
/// failed pass is logged and the next one still runs.
pub async fn run(config: &AppConfig, repeat: bool) -> Result<()> {
    if !repeat {
        run_pass(config).await?;
        return Ok(());
    }

    let interval = config.schedule.interval;
    loop {
        match run_pass(config).await {
            Ok(metrics) => {
                if !metrics.is_clean() {
                    warn!("Pass finished with failures; the next pass will retry them");
                }
            }
            Err(e) => error!("Sync pass aborted: {:#}", e),
        }
        info!("Next sync pass in {:?}", interval);
        tokio::time::sleep(interval).await;
    }
}

/// Fetches both snapshots and prints the intended actions without
/// applying any of them.
pub async fn print_plan(config: &AppConfig) -> Result<()> {
    let plan = build_plan(config).await?;

    if plan.is_converged() {
        println!("Nothing to change; the target server matches the directory");
    }
    for action in &plan.actions {
        println!("{:<8} {}", action.kind(), action.client_id());
    }
    println!("{}", plan.summary.describe());
    Ok(())
}

/// Probes each collaborator in turn and reports what works.
pub async fn check(config: &AppConfig) -> Result<()> {
    let directory = DirectoryApi::connect(config.directory.clone()).await?;

    let metadata = match directory.discover().await {
        Ok(metadata) => {
            println!("✓ Discovery succeeded for issuer {}", metadata.issuer);
            metadata
        }
        Err(e) => {
            println!("✗ Discovery failed: {}", e);
            return Err(e.into());
        }
    };

    match directory.request_token(&metadata).await {
        Ok(token) => println!(
            "✓ Token endpoint issued a {} token",
            token.token_type.as_deref().unwrap_or("bearer")
        ),
        Err(e) => {
            println!("✗ Token request failed: {}", e);
            return Err(e.into());
        }
    }

    let admin = AdminClient::connect(&config.target)?;
    match admin.list_clients().await {
        Ok(clients) => println!(
            "✓ Admin API reachable; target server holds {} clients",
            clients.len()
        ),
        Err(e) => {
            println!("✗ Admin API unreachable: {}", e);
            return Err(e.into());
        }
    }

    Ok(())
}

/// Deletes directory-managed clients from the target server, or every
/// client with `--all`.
pub async fn purge(config: &AppConfig, all: bool, yes: bool) -> Result<()> {
    if !yes {
        anyhow::bail!("purge deletes clients from the target server; pass --yes to confirm");
    }
    if all {
        warn!("Purging every client on the target server, not only directory-managed ones");
    }

    let admin = AdminClient::connect(&config.target)?;
    let existing = admin.list_clients().await?;

    let mut deleted = 0usize;
    for client in &existing {
        if !all && !client.is_directory_managed() {
            continue;
        }
        info!("Deleting client {}", client.client_id);
        let outcome = admin.delete_client(&client.client_id).await?;
        if outcome.ok {
            deleted += 1;
        } else {
            warn!(
                "Target server rejected the delete for {} with HTTP {}",
                client.client_id, outcome.status
            );
        }
    }

    println!("Deleted {} of {} clients", deleted, existing.len());
    Ok(())
}

async fn build_plan(config: &AppConfig) -> Result<SyncPlan> {
    let template = load_template(&config.target).await?;
    let reconciler = Reconciler::new(config.policy.clone(), template)?;

    let directory = DirectoryApi::connect(config.directory.clone()).await?;
    let admin = AdminClient::connect(&config.target)?;

    let records = directory.fetch_authoritative().await?;
    let existing = admin.list_clients().await?;

    Ok(reconciler.plan(&records, &existing))
}

async fn load_template(target: &TargetSettings) -> Result<OAuthClient> {
    match &target.client_definition {
        Some(path) => {
            let content = tokio::fs::read_to_string(path).await?;
            let template: OAuthClient = serde_json::from_str(&content)?;
            Ok(template)
        }
        None => Ok(OAuthClient::default()),
    }
}
