//! Migration settings from environment variables.

use crate::domain::entities::{
    DeployConfigOverrides, FeatureOverrides, FullMigrationConfig, TxDefaults,
};
use crate::domain::value_objects::Address;
use crate::errors::ConfigError;
use crate::service::ServiceConfig;
use std::collections::HashMap;
use std::env;

/// Which orchestrator to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationMode {
    /// Registry and ownable only.
    Bootstrap,
    /// Every feature.
    Full,
}

/// Settings for one migration run.
#[derive(Debug, Clone)]
pub struct MigrationSettings {
    /// Sender identity for every transaction.
    pub sender: Address,
    /// Final owner of the proxy.
    pub owner: Address,
    /// Bootstrap or full.
    pub mode: MigrationMode,
    /// Full-migration parameters.
    pub migration: FullMigrationConfig,
    /// Features reused instead of deployed.
    pub overrides: FeatureOverrides,
    /// Orchestrator behaviour.
    pub service: ServiceConfig,
    /// Log level filter (trace, debug, info, warn, error).
    pub log_level: String,
    /// Whether to emit JSON formatted logs.
    pub json_logs: bool,
}

impl MigrationSettings {
    /// Create settings from the process environment.
    ///
    /// # Environment Variables
    ///
    /// - `PM_SENDER`: Sender address (required)
    /// - `PM_OWNER`: Final owner (default: sender)
    /// - `PM_MODE`: `bootstrap` or `full` (default: full)
    /// - `PM_WETH_ADDRESS`, `PM_STAKING_ADDRESS`: Limit-order peers (default: zero)
    /// - `PM_PROTOCOL_FEE_MULTIPLIER`: Fee multiplier (default: 70000)
    /// - `PM_TRANSFORMER_DEPLOYER`: Deployer of record (default: sender)
    /// - `PM_OVERRIDES`: JSON object of reused feature addresses keyed by role
    ///   name, e.g. `{"registry":"0x..."}` (default: none)
    /// - `PM_SEQUENTIAL`: Disable concurrent deployments (default: false)
    /// - `PM_LOG_LEVEL` or `RUST_LOG`: Log level (default: info)
    /// - `PM_JSON_LOGS`: Enable JSON logs (default: false)
    ///
    /// # Errors
    ///
    /// [`ConfigError`] for a missing sender or any unparsable value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Create settings from an explicit variable map.
    ///
    /// # Errors
    ///
    /// See [`MigrationSettings::from_env`].
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let get = |key: &str| vars.get(key).map(|v| v.trim()).filter(|v| !v.is_empty());
        let flag = |key: &str| {
            get(key).is_some_and(|v| v.eq_ignore_ascii_case("true") || v == "1")
        };

        let sender = address_var(get, "PM_SENDER")?.ok_or(ConfigError::MissingSender)?;
        let owner = address_var(get, "PM_OWNER")?.unwrap_or(sender);

        let mode = match get("PM_MODE").map(str::to_ascii_lowercase).as_deref() {
            None | Some("full") => MigrationMode::Full,
            Some("bootstrap") => MigrationMode::Bootstrap,
            Some(other) => {
                return Err(ConfigError::InvalidValue {
                    key: "PM_MODE".to_string(),
                    reason: format!("unknown mode {other:?}"),
                })
            }
        };

        let protocol_fee_multiplier = get("PM_PROTOCOL_FEE_MULTIPLIER")
            .map(|v| {
                v.parse::<u32>().map_err(|e| ConfigError::InvalidValue {
                    key: "PM_PROTOCOL_FEE_MULTIPLIER".to_string(),
                    reason: e.to_string(),
                })
            })
            .transpose()?;

        let migration = FullMigrationConfig {
            deploy: DeployConfigOverrides {
                proxy_address: None,
                weth_address: address_var(get, "PM_WETH_ADDRESS")?,
                staking_address: address_var(get, "PM_STAKING_ADDRESS")?,
                protocol_fee_multiplier,
            },
            transformer_deployer: address_var(get, "PM_TRANSFORMER_DEPLOYER")?,
        };

        let overrides = get("PM_OVERRIDES")
            .map(|v| {
                serde_json::from_str::<FeatureOverrides>(v).map_err(|e| {
                    ConfigError::InvalidValue {
                        key: "PM_OVERRIDES".to_string(),
                        reason: e.to_string(),
                    }
                })
            })
            .transpose()?
            .unwrap_or_default();

        Ok(Self {
            sender,
            owner,
            mode,
            migration,
            overrides,
            service: ServiceConfig {
                concurrent_deploys: !flag("PM_SEQUENTIAL"),
                ..ServiceConfig::default()
            },
            log_level: get("PM_LOG_LEVEL")
                .or_else(|| get("RUST_LOG"))
                .unwrap_or("info")
                .to_string(),
            json_logs: flag("PM_JSON_LOGS"),
        })
    }

    /// Transaction defaults sending from the configured sender.
    #[must_use]
    pub fn tx_defaults(&self) -> TxDefaults {
        TxDefaults::from_sender(self.sender)
    }
}

fn address_var<'a>(
    get: impl Fn(&str) -> Option<&'a str>,
    key: &str,
) -> Result<Option<Address>, ConfigError> {
    get(key)
        .map(|v| {
            v.parse::<Address>().map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                reason: e.to_string(),
            })
        })
        .transpose()
}
