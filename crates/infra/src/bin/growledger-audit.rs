//! Verify every item ledger of one tenant against its stored balance.
//!
//! Usage: `growledger-audit <tenant-uuid>`
//!
//! Exits non-zero when any ledger is inconsistent.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, bail};

use growledger_auth::{Actor, RequestContext, Role, TenantContext};
use growledger_core::{TenantId, UserId};
use growledger_events::InMemoryEventBus;
use growledger_infra::{
    InMemoryTenantDirectory, InfraConfig, InventoryEnvelope, PostgresInventoryStore, ServiceError, StockMutationService,
};
use growledger_observability::TracingConfig;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let tracing_config = TracingConfig::from_env()?;
    growledger_observability::init(&tracing_config);

    let Some(raw_tenant) = std::env::args().nth(1) else {
        bail!("usage: growledger-audit <tenant-uuid>");
    };
    let tenant_id: TenantId = raw_tenant
        .parse()
        .with_context(|| format!("'{raw_tenant}' is not a tenant id"))?;

    let config = InfraConfig::from_env()?;
    config.require_database_url()?;
    let store = PostgresInventoryStore::connect(&config)
        .await
        .context("failed to connect to postgres")?;

    // Read-only audit: no organization lookups or batch checks are needed.
    let service = StockMutationService::new(
        store,
        InMemoryTenantDirectory::new(),
        Arc::new(InMemoryEventBus::<InventoryEnvelope>::new()),
        &config,
    );

    let auditor = Actor::new(UserId::new(), Role::SuperAdmin, None);
    let ctx = RequestContext::resolve(Some(&auditor), &TenantContext::for_tenant(tenant_id))?;

    let items = service.list_items(&ctx).await?;
    tracing::info!(tenant_id = %tenant_id, items = items.len(), "auditing inventory ledgers");

    let mut inconsistent = 0usize;
    for item in &items {
        match service.verify_item_ledger(&ctx, item.id).await {
            Ok(summary) => {
                tracing::info!(
                    item_id = %item.id,
                    entries = summary.entries,
                    current_quantity = summary.current_quantity,
                    "ledger consistent"
                );
            }
            Err(ServiceError::InvariantViolation(reason)) => {
                inconsistent += 1;
                println!("INCONSISTENT {} {}: {reason}", item.id, item.name);
            }
            Err(other) => return Err(other).with_context(|| format!("failed to audit item {}", item.id)),
        }
    }

    println!("{} items audited, {inconsistent} inconsistent", items.len());
    Ok(if inconsistent == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
