//! # Migration Service
//!
//! The staged provisioning orchestrator. Implements [`ProxyMigrationApi`] on
//! top of the driven ports.
//!
//! ## Ordering
//!
//! ```text
//! migrator ──→ [getBootstrapper] ──→ proxy ──→ dependent features ──┐
//!                                                                    ├──→ finalize
//! registry, ownable, tokenSpender, signatureValidator ───────────────┘
//! ```
//!
//! The left chain and the independent batch may run concurrently. Dependent
//! features (transformERC20, metaTransactions, limitOrders) start only once
//! the proxy address is known. Finalize is submitted once, after every role
//! resolved, and is the only step that changes the proxy's owner or registry.

use crate::adapters::InMemoryChain;
use crate::domain::entities::{
    Artifact, BootstrapFeatures, ConstructorArgs, DeployConfigOverrides, DeployedContract,
    FeatureOverrides, FeatureRole, FullFeatures, FullFeaturesDeployConfig, FullMigrationConfig,
    MigrateOptions, TxDefaults,
};
use crate::domain::handle::{BootstrappedProxy, FullProxy};
use crate::domain::invariants::{
    check_bootstrapper, check_dependent_binding, check_owner, check_proxy_binding,
    check_roles_resolved,
};
use crate::domain::value_objects::Address;
use crate::errors::{ConfigError, DeployError, MigrationError, MigrationStep, TxError};
use crate::ports::inbound::ProxyMigrationApi;
use crate::ports::outbound::{DeploymentPrimitive, EntryPointCall, TransactionSubmitter, ViewCall};
use crate::resolver::{resolve_feature, Resolution};

use async_trait::async_trait;
use futures::future::try_join_all;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// Features that never depend on the proxy address.
pub const INDEPENDENT_ROLES: [FeatureRole; 4] = [
    FeatureRole::Registry,
    FeatureRole::Ownable,
    FeatureRole::TokenSpender,
    FeatureRole::SignatureValidator,
];

/// Features whose constructor takes the proxy address.
pub const DEPENDENT_ROLES: [FeatureRole; 3] = [
    FeatureRole::TransformErc20,
    FeatureRole::MetaTransactions,
    FeatureRole::LimitOrders,
];

/// Migration service configuration.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Run proxy-independent deployments concurrently with the proxy chain.
    pub concurrent_deploys: bool,
    /// Read back owner and registrations after finalize.
    pub verify_handoff: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            concurrent_deploys: true,
            verify_handoff: true,
        }
    }
}

/// Statistics for the migration service.
#[derive(Debug, Default, Clone, Serialize)]
pub struct ServiceStats {
    /// Migrations started (bootstrap and full).
    pub migrations_started: u64,
    /// Migrations that returned a handle.
    pub migrations_completed: u64,
    /// Migrations that failed at any step.
    pub migrations_failed: u64,
    /// Failures at the finalize step.
    pub finalize_failures: u64,
    /// Features deployed fresh.
    pub features_deployed: u64,
    /// Features taken from caller overrides.
    pub features_reused: u64,
}

/// The proxy migration orchestrator.
pub struct MigrationService<D: DeploymentPrimitive, T: TransactionSubmitter> {
    /// Service configuration.
    config: ServiceConfig,
    /// Deployment primitive.
    deployer: Arc<D>,
    /// Transaction submission and view calls.
    submitter: Arc<T>,
    /// Service statistics.
    stats: Arc<RwLock<ServiceStats>>,
}

impl<D: DeploymentPrimitive, T: TransactionSubmitter> MigrationService<D, T> {
    /// Create a new migration service.
    pub fn new(deployer: Arc<D>, submitter: Arc<T>, config: ServiceConfig) -> Self {
        Self {
            config,
            deployer,
            submitter,
            stats: Arc::new(RwLock::new(ServiceStats::default())),
        }
    }

    /// Get current service statistics.
    pub async fn stats(&self) -> ServiceStats {
        self.stats.read().await.clone()
    }

    /// Service configuration.
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    // -------------------------------------------------------------------------
    // Building blocks
    // -------------------------------------------------------------------------

    /// Await both futures, concurrently if configured.
    async fn run_pair<A, B>(
        &self,
        a: impl Future<Output = Result<A, MigrationError>>,
        b: impl Future<Output = Result<B, MigrationError>>,
    ) -> Result<(A, B), MigrationError> {
        if self.config.concurrent_deploys {
            tokio::try_join!(a, b)
        } else {
            let a = a.await?;
            let b = b.await?;
            Ok((a, b))
        }
    }

    async fn deploy_step(
        &self,
        step: MigrationStep,
        artifact: Artifact,
        tx: &TxDefaults,
        args: ConstructorArgs,
    ) -> Result<DeployedContract, MigrationError> {
        let contract = self
            .deployer
            .deploy(artifact, tx, args)
            .await
            .map_err(|e| MigrationError::deployment(step, e))?;
        if contract.address.is_zero() {
            return Err(MigrationError::deployment(
                step,
                DeployError::ZeroAddress(artifact),
            ));
        }
        debug!(step = %step, address = ?contract.address, "Deployed");
        Ok(contract)
    }

    /// Reads the proxy's bootstrap caller and compares it with `expected`.
    async fn verify_proxy_binding(
        &self,
        proxy: Address,
        expected: Address,
    ) -> Result<(), MigrationError> {
        let observed = self
            .submitter
            .call_address(proxy, ViewCall::BootstrapCaller)
            .await
            .map_err(|source| MigrationError::Query {
                step: MigrationStep::Proxy,
                source,
            })?;
        check_proxy_binding(expected, observed)?;
        debug!(proxy = ?proxy, bootstrap_caller = ?observed, "Proxy binding confirmed");
        Ok(())
    }

    async fn resolve_role(
        &self,
        role: FeatureRole,
        tx: &TxDefaults,
        overrides: &FeatureOverrides,
        config: &FullFeaturesDeployConfig,
    ) -> Result<Resolution, MigrationError> {
        let args = role.constructor_args(config);
        resolve_feature(role, overrides.get(role), || {
            self.deployer.deploy(role.artifact(), tx, args)
        })
        .await
    }

    /// Resolve sibling roles that do not depend on each other.
    async fn resolve_batch(
        &self,
        roles: &[FeatureRole],
        tx: &TxDefaults,
        overrides: &FeatureOverrides,
        config: &FullFeaturesDeployConfig,
    ) -> Result<Vec<(FeatureRole, Resolution)>, MigrationError> {
        let pending = roles.iter().map(|&role| async move {
            let resolution = self.resolve_role(role, tx, overrides, config).await?;
            Ok::<_, MigrationError>((role, resolution))
        });

        let resolved = if self.config.concurrent_deploys {
            try_join_all(pending).await?
        } else {
            let mut resolved = Vec::with_capacity(roles.len());
            for fut in pending {
                resolved.push(fut.await?);
            }
            resolved
        };

        let deployed = resolved.iter().filter(|(_, r)| r.was_deployed()).count() as u64;
        let mut stats = self.stats.write().await;
        stats.features_deployed += deployed;
        stats.features_reused += resolved.len() as u64 - deployed;
        Ok(resolved)
    }

    async fn resolve_minimal(
        &self,
        tx: &TxDefaults,
        overrides: &FeatureOverrides,
    ) -> Result<BootstrapFeatures, MigrationError> {
        let resolved = self
            .resolve_batch(
                &FeatureRole::BOOTSTRAP,
                tx,
                overrides,
                &FullFeaturesDeployConfig::default(),
            )
            .await?;
        Ok(BootstrapFeatures {
            registry: address_of(&resolved, FeatureRole::Registry),
            ownable: address_of(&resolved, FeatureRole::Ownable),
        })
    }

    /// Reads back owner and one registration per role.
    async fn verify_handoff(
        &self,
        migrator: Address,
        proxy: Address,
        owner: Address,
        features: Vec<(FeatureRole, Address)>,
    ) -> Result<(), MigrationError> {
        let finalize_err = |source: TxError| MigrationError::Finalize {
            migrator,
            proxy,
            source,
        };

        let actual_owner = self
            .submitter
            .call_address(proxy, ViewCall::Owner)
            .await
            .map_err(finalize_err)?;
        if actual_owner != owner {
            return Err(finalize_err(TxError::PostconditionViolated(format!(
                "owner is {actual_owner:?}, expected {owner:?}"
            ))));
        }

        for (role, expected) in features {
            let implementation = self
                .submitter
                .call_address(proxy, ViewCall::FunctionImplementation(role.entry_selector()))
                .await
                .map_err(finalize_err)?;
            if implementation != expected {
                return Err(finalize_err(TxError::PostconditionViolated(format!(
                    "{role} resolves to {implementation:?}, expected {expected:?}"
                ))));
            }
        }
        Ok(())
    }

    async fn record_outcome<R>(&self, result: &Result<R, MigrationError>) {
        let mut stats = self.stats.write().await;
        match result {
            Ok(_) => stats.migrations_completed += 1,
            Err(e) => {
                stats.migrations_failed += 1;
                if e.is_finalize_failure() {
                    stats.finalize_failures += 1;
                }
                error!(error = %e, "Migration failed");
            }
        }
    }

    // -------------------------------------------------------------------------
    // Orchestrators
    // -------------------------------------------------------------------------

    async fn run_bootstrap(
        &self,
        owner: Address,
        tx: &TxDefaults,
        overrides: &FeatureOverrides,
    ) -> Result<BootstrappedProxy, MigrationError> {
        check_owner(owner)?;
        let sender = tx.sender()?;
        for role in overrides.roles().filter(|r| !FeatureRole::BOOTSTRAP.contains(r)) {
            warn!(role = %role, "Override ignored by bootstrap migration");
        }

        let bind_proxy = async {
            let migrator = self
                .deploy_step(
                    MigrationStep::Migrator(Artifact::InitialMigration),
                    Artifact::InitialMigration,
                    tx,
                    ConstructorArgs::Migrator {
                        initialize_caller: sender,
                    },
                )
                .await?
                .address;

            let args = ConstructorArgs::Proxy {
                bootstrapper: migrator,
            };
            let proxy = self
                .deploy_step(MigrationStep::Proxy, Artifact::ExchangeProxy, tx, args)
                .await?
                .address;
            self.verify_proxy_binding(proxy, migrator).await?;
            Ok::<_, MigrationError>((migrator, proxy))
        };

        let ((migrator, proxy), features) = self
            .run_pair(bind_proxy, self.resolve_minimal(tx, overrides))
            .await?;

        check_roles_resolved(features.iter())?;
        info!(migrator = ?migrator, proxy = ?proxy, "Finalizing bootstrap migration");

        let receipt = self
            .submitter
            .submit_and_await(
                migrator,
                EntryPointCall::InitializeProxy {
                    owner,
                    proxy,
                    features,
                },
                tx,
            )
            .await
            .map_err(|source| MigrationError::Finalize {
                migrator,
                proxy,
                source,
            })?;

        if self.config.verify_handoff {
            self.verify_handoff(migrator, proxy, owner, features.iter().collect())
                .await?;
        }

        info!(proxy = ?proxy, tx_hash = %receipt.tx_hash, "Bootstrap migration complete");
        Ok(BootstrappedProxy::new(proxy, owner, receipt))
    }

    async fn run_full(
        &self,
        owner: Address,
        tx: &TxDefaults,
        overrides: &FeatureOverrides,
        config: &FullMigrationConfig,
    ) -> Result<FullProxy, MigrationError> {
        check_owner(owner)?;
        let sender = tx.sender()?;
        if config.deploy.proxy_address.is_some() {
            warn!("proxy_address in migration config is replaced by the new proxy");
        }
        let base = FullFeaturesDeployConfig::merged(&config.deploy);

        let bind_proxy = async {
            let migrator = self
                .deploy_step(
                    MigrationStep::Migrator(Artifact::FullMigration),
                    Artifact::FullMigration,
                    tx,
                    ConstructorArgs::Migrator {
                        initialize_caller: sender,
                    },
                )
                .await?
                .address;

            let bootstrapper = self
                .submitter
                .call_address(migrator, ViewCall::GetBootstrapper)
                .await
                .map_err(|source| MigrationError::Query {
                    step: MigrationStep::Bootstrapper,
                    source,
                })?;
            check_bootstrapper(migrator, bootstrapper, sender)?;

            let args = ConstructorArgs::Proxy { bootstrapper };
            let proxy = self
                .deploy_step(MigrationStep::Proxy, Artifact::ExchangeProxy, tx, args)
                .await?
                .address;
            self.verify_proxy_binding(proxy, bootstrapper).await?;
            Ok::<_, MigrationError>((migrator, proxy))
        };

        let ((migrator, proxy), mut resolved) = self
            .run_pair(
                bind_proxy,
                self.resolve_batch(&INDEPENDENT_ROLES, tx, overrides, &base),
            )
            .await?;

        // The proxy address is known from here on.
        let deploy_config = base.with_proxy(proxy);
        let dependent = self
            .resolve_batch(&DEPENDENT_ROLES, tx, overrides, &deploy_config)
            .await?;
        check_deployed_bindings(&dependent, proxy)?;
        resolved.extend(dependent);

        let features = full_features_from(&resolved);
        check_roles_resolved(features.iter())?;

        let options = MigrateOptions {
            config: deploy_config,
            transformer_deployer: config
                .transformer_deployer
                .filter(|a| !a.is_zero())
                .unwrap_or(sender),
        };
        info!(
            migrator = ?migrator,
            proxy = ?proxy,
            transformer_deployer = ?options.transformer_deployer,
            "Finalizing full migration"
        );

        let receipt = self
            .submitter
            .submit_and_await(
                migrator,
                EntryPointCall::MigrateProxy {
                    owner,
                    proxy,
                    features,
                    options,
                },
                tx,
            )
            .await
            .map_err(|source| MigrationError::Finalize {
                migrator,
                proxy,
                source,
            })?;

        if self.config.verify_handoff {
            self.verify_handoff(migrator, proxy, owner, features.iter().collect())
                .await?;
        }

        info!(proxy = ?proxy, tx_hash = %receipt.tx_hash, "Full migration complete");
        Ok(FullProxy::new(proxy, owner, receipt))
    }
}

/// Freshly deployed dependent features must report `proxy` as their binding.
/// Reused addresses are left to the execution environment at finalize.
fn check_deployed_bindings(
    resolved: &[(FeatureRole, Resolution)],
    proxy: Address,
) -> Result<(), ConfigError> {
    for (role, resolution) in resolved {
        if let Resolution::Deployed(contract) = resolution {
            check_dependent_binding(*role, &contract.args, proxy)?;
        }
    }
    Ok(())
}

fn address_of(resolved: &[(FeatureRole, Resolution)], role: FeatureRole) -> Address {
    resolved
        .iter()
        .find(|(r, _)| *r == role)
        .map_or(Address::ZERO, |(_, resolution)| resolution.address())
}

fn full_features_from(resolved: &[(FeatureRole, Resolution)]) -> FullFeatures {
    FullFeatures {
        registry: address_of(resolved, FeatureRole::Registry),
        ownable: address_of(resolved, FeatureRole::Ownable),
        token_spender: address_of(resolved, FeatureRole::TokenSpender),
        transform_erc20: address_of(resolved, FeatureRole::TransformErc20),
        signature_validator: address_of(resolved, FeatureRole::SignatureValidator),
        meta_transactions: address_of(resolved, FeatureRole::MetaTransactions),
        limit_orders: address_of(resolved, FeatureRole::LimitOrders),
    }
}

#[async_trait]
impl<D, T> ProxyMigrationApi for MigrationService<D, T>
where
    D: DeploymentPrimitive + 'static,
    T: TransactionSubmitter + 'static,
{
    #[instrument(skip(self, tx, overrides))]
    async fn deploy_minimal_features(
        &self,
        tx: &TxDefaults,
        overrides: &FeatureOverrides,
    ) -> Result<BootstrapFeatures, MigrationError> {
        tx.sender()?;
        let features = self.resolve_minimal(tx, overrides).await?;
        check_roles_resolved(features.iter())?;
        Ok(features)
    }

    #[instrument(skip(self, tx, overrides), fields(migration_id = %Uuid::new_v4()))]
    async fn bootstrap_migrate(
        &self,
        owner: Address,
        tx: &TxDefaults,
        overrides: &FeatureOverrides,
    ) -> Result<BootstrappedProxy, MigrationError> {
        info!("Starting bootstrap migration");
        self.stats.write().await.migrations_started += 1;
        let result = self.run_bootstrap(owner, tx, overrides).await;
        self.record_outcome(&result).await;
        result
    }

    #[instrument(skip(self, tx, config, overrides))]
    async fn deploy_full_features(
        &self,
        tx: &TxDefaults,
        config: &DeployConfigOverrides,
        overrides: &FeatureOverrides,
    ) -> Result<FullFeatures, MigrationError> {
        tx.sender()?;
        let config = FullFeaturesDeployConfig::merged(config);
        if config.proxy_address.is_zero() {
            warn!("Deploying dependent features without a proxy address");
        }

        let (mut resolved, dependent) = self
            .run_pair(
                self.resolve_batch(&INDEPENDENT_ROLES, tx, overrides, &config),
                self.resolve_batch(&DEPENDENT_ROLES, tx, overrides, &config),
            )
            .await?;
        check_deployed_bindings(&dependent, config.proxy_address)?;
        resolved.extend(dependent);

        let features = full_features_from(&resolved);
        check_roles_resolved(features.iter())?;
        Ok(features)
    }

    #[instrument(skip(self, tx, overrides, config), fields(migration_id = %Uuid::new_v4()))]
    async fn full_migrate(
        &self,
        owner: Address,
        tx: &TxDefaults,
        overrides: &FeatureOverrides,
        config: &FullMigrationConfig,
    ) -> Result<FullProxy, MigrationError> {
        info!("Starting full migration");
        self.stats.write().await.migrations_started += 1;
        let result = self.run_full(owner, tx, overrides, config).await;
        self.record_outcome(&result).await;
        result
    }
}

/// Create a service backed by a fresh in-memory chain.
///
/// Returns the chain as well so callers can inspect or fault-inject it.
#[must_use]
pub fn create_in_memory_service(
    config: ServiceConfig,
) -> (MigrationService<InMemoryChain, InMemoryChain>, Arc<InMemoryChain>) {
    let chain = Arc::new(InMemoryChain::new());
    let service = MigrationService::new(Arc::clone(&chain), Arc::clone(&chain), config);
    (service, chain)
}

// =============================================================================
// TESTS
// =============================================================================
