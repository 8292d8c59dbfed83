//! # proxy-migrate
//!
//! Runs a bootstrap or full migration against the in-memory chain and prints
//! the resulting proxy, feature addresses and service statistics as JSON.
//!
//! Configuration comes from `PM_*` environment variables, see
//! [`MigrationSettings::from_env`].

use anyhow::{Context, Result};
use proxy_migration::config::{MigrationMode, MigrationSettings};
use proxy_migration::prelude::*;
use serde_json::json;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn init_tracing(settings: &MigrationSettings) -> Result<()> {
    let env_filter = EnvFilter::try_new(&settings.log_level)
        .with_context(|| format!("invalid log level {:?}", settings.log_level))?;

    if settings.json_logs {
        let json_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_writer(std::io::stderr);
        tracing_subscriber::registry()
            .with(env_filter)
            .with(json_layer)
            .try_init()
            .context("failed to install subscriber")?;
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_ansi(true)
            .with_writer(std::io::stderr);
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
            .context("failed to install subscriber")?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let settings = MigrationSettings::from_env().context("failed to load PM_* settings")?;
    init_tracing(&settings)?;
    info!(version = proxy_migration::VERSION, mode = ?settings.mode, "Starting {}", proxy_migration::COMPONENT_NAME);

    let (service, chain) = create_in_memory_service(settings.service.clone());
    let tx = settings.tx_defaults();
    let overrides = settings.overrides.clone();

    let (proxy, surface, entry_points) = match settings.mode {
        MigrationMode::Bootstrap => {
            let handle = service
                .bootstrap_migrate(settings.owner, &tx, &overrides)
                .await
                .context("bootstrap migration failed")?;
            (
                serde_json::to_value(handle)?,
                handle.surface(),
                handle.entry_points().count(),
            )
        }
        MigrationMode::Full => {
            let handle = service
                .full_migrate(settings.owner, &tx, &overrides, &settings.migration)
                .await
                .context("full migration failed")?;
            (
                serde_json::to_value(handle)?,
                handle.surface(),
                handle.entry_points().count(),
            )
        }
    };

    let deployments: Vec<_> = chain
        .deployments()
        .into_iter()
        .map(|record| json!({ "artifact": record.artifact.to_string(), "address": record.address }))
        .collect();

    let report = json!({
        "proxy": proxy,
        "surface": surface,
        "entryPoints": entry_points,
        "deployments": deployments,
        "stats": service.stats().await,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
