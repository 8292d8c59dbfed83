//! # In-Memory Execution Environment
//!
//! Simulated chain implementing both driven ports, for tests and dry runs.
//! A production adapter would talk to a node instead.
//!
//! What it models:
//! - CREATE-style addresses derived from sender and nonce
//! - migrators that remember their initialize caller and bootstrapper, and
//!   become inert after one successful finalize
//! - proxies that only accept a bootstrap from the authority they were built
//!   for, and register feature selectors atomically with the ownership
//!   transfer
//! - fault injection for deployments and finalize

use crate::domain::entities::{
    Artifact, ConstructorArgs, DeployedContract, FullFeaturesDeployConfig,
    MigrateOptions, TxDefaults, TxReceipt,
};
use crate::domain::services::{compute_contract_address, simulated_tx_hash};
use crate::domain::value_objects::{Address, Selector};
use crate::errors::{DeployError, TxError};
use crate::ports::outbound::{DeploymentPrimitive, EntryPointCall, TransactionSubmitter, ViewCall};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

/// Entry point every fresh proxy exposes until it is bootstrapped.
pub const BOOTSTRAP_ENTRY_POINT: &str = "bootstrap(address,bytes)";

/// One call to [`DeploymentPrimitive::deploy`] that succeeded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeployRecord {
    /// Position in the chain's global call order.
    pub seq: u64,
    /// Sending account.
    pub deployer: Address,
    /// What was deployed.
    pub artifact: Artifact,
    /// Constructor arguments it was deployed with.
    pub args: ConstructorArgs,
    /// Resulting contract address.
    pub address: Address,
}

/// One call to [`TransactionSubmitter::submit_and_await`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubmissionRecord {
    /// Position in the chain's global call order.
    pub seq: u64,
    /// Sending account.
    pub sender: Address,
    /// Target contract.
    pub to: Address,
    /// Entry point and arguments.
    pub call: EntryPointCall,
    /// Receipt, or the reason the call reverted.
    pub outcome: Result<TxReceipt, TxError>,
}

#[derive(Debug)]
struct MigratorState {
    kind: Artifact,
    initialize_caller: Address,
    bootstrapper: Address,
    spent: bool,
}

#[derive(Debug)]
struct ProxyState {
    bootstrapper: Address,
    owner: Address,
    implementations: BTreeMap<Selector, Address>,
    migrate_options: Option<MigrateOptions>,
}

#[derive(Debug, Default)]
struct ChainState {
    seq: u64,
    block_number: u64,
    nonces: HashMap<Address, u64>,
    contracts: HashMap<Address, DeployRecord>,
    migrators: HashMap<Address, MigratorState>,
    proxies: HashMap<Address, ProxyState>,
    deploy_log: Vec<DeployRecord>,
    submissions: Vec<SubmissionRecord>,
    failing_artifacts: HashMap<Artifact, String>,
    finalize_rejection: Option<String>,
}

impl ChainState {
    fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }

    fn next_nonce(&mut self, account: Address) -> u64 {
        let nonce = self.nonces.entry(account).or_insert(0);
        let current = *nonce;
        *nonce += 1;
        current
    }
}

/// Simulated execution environment.
#[derive(Debug, Default)]
pub struct InMemoryChain {
    state: RwLock<ChainState>,
}

impl InMemoryChain {
    /// Create an empty chain.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // -------------------------------------------------------------------------
    // Fault injection
    // -------------------------------------------------------------------------

    /// Make every deployment of `artifact` fail with `reason`.
    pub fn fail_deployments_of(&self, artifact: Artifact, reason: impl Into<String>) {
        self.state
            .write()
            .failing_artifacts
            .insert(artifact, reason.into());
    }

    /// Make every finalize call revert with `reason`.
    pub fn reject_finalize(&self, reason: impl Into<String>) {
        self.state.write().finalize_rejection = Some(reason.into());
    }

    /// Remove all injected faults.
    pub fn clear_faults(&self) {
        let mut state = self.state.write();
        state.failing_artifacts.clear();
        state.finalize_rejection = None;
    }

    // -------------------------------------------------------------------------
    // Inspection
    // -------------------------------------------------------------------------

    /// Every successful deployment, in order.
    #[must_use]
    pub fn deployments(&self) -> Vec<DeployRecord> {
        self.state.read().deploy_log.clone()
    }

    /// Successful deployments of `artifact`, in order.
    #[must_use]
    pub fn deployments_of(&self, artifact: Artifact) -> Vec<DeployRecord> {
        self.state
            .read()
            .deploy_log
            .iter()
            .filter(|r| r.artifact == artifact)
            .cloned()
            .collect()
    }

    /// Every submission, successful or not, in order.
    #[must_use]
    pub fn submissions(&self) -> Vec<SubmissionRecord> {
        self.state.read().submissions.clone()
    }

    /// Current owner of `proxy`; zero until finalized.
    #[must_use]
    pub fn proxy_owner(&self, proxy: Address) -> Option<Address> {
        self.state.read().proxies.get(&proxy).map(|p| p.owner)
    }

    /// Feature selectors registered on `proxy`.
    #[must_use]
    pub fn registered_selectors(&self, proxy: Address) -> Vec<Selector> {
        let bootstrap = Selector::of(BOOTSTRAP_ENTRY_POINT);
        self.state
            .read()
            .proxies
            .get(&proxy)
            .map(|p| {
                p.implementations
                    .keys()
                    .copied()
                    .filter(|s| *s != bootstrap)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Options the full migrator handed to `proxy`.
    #[must_use]
    pub fn migrate_options(&self, proxy: Address) -> Option<MigrateOptions> {
        self.state
            .read()
            .proxies
            .get(&proxy)
            .and_then(|p| p.migrate_options)
    }

    /// Whether `migrator` has already finalized a proxy.
    #[must_use]
    pub fn is_spent(&self, migrator: Address) -> Option<bool> {
        self.state.read().migrators.get(&migrator).map(|m| m.spent)
    }

    // -------------------------------------------------------------------------
    // Deployment
    // -------------------------------------------------------------------------

    fn deploy_now(
        &self,
        artifact: Artifact,
        tx: &TxDefaults,
        args: ConstructorArgs,
    ) -> Result<DeployedContract, DeployError> {
        let sender = tx
            .from
            .filter(|a| !a.is_zero())
            .ok_or(DeployError::MissingSender)?;
        let rejected = |reason: &str| DeployError::Rejected {
            artifact,
            reason: reason.to_string(),
        };

        let mut state = self.state.write();
        if let Some(reason) = state.failing_artifacts.get(&artifact) {
            return Err(rejected(reason));
        }
        validate_constructor(artifact, &args).map_err(|reason| rejected(reason))?;

        let nonce = state.next_nonce(sender);
        let address = compute_contract_address(sender, nonce);
        let seq = state.next_seq();
        state.block_number += 1;

        match (&artifact, &args) {
            (Artifact::InitialMigration, ConstructorArgs::Migrator { initialize_caller }) => {
                state.migrators.insert(
                    address,
                    MigratorState {
                        kind: artifact,
                        initialize_caller: *initialize_caller,
                        bootstrapper: address,
                        spent: false,
                    },
                );
            }
            (Artifact::FullMigration, ConstructorArgs::Migrator { initialize_caller }) => {
                // The full migrator bootstraps through a child it creates in
                // its constructor; contract nonces start at 1.
                let _ = state.next_nonce(address);
                let child_nonce = state.next_nonce(address);
                let bootstrapper = compute_contract_address(address, child_nonce);
                state.migrators.insert(
                    address,
                    MigratorState {
                        kind: artifact,
                        initialize_caller: *initialize_caller,
                        bootstrapper,
                        spent: false,
                    },
                );
            }
            (Artifact::ExchangeProxy, ConstructorArgs::Proxy { bootstrapper }) => {
                let mut implementations = BTreeMap::new();
                implementations.insert(Selector::of(BOOTSTRAP_ENTRY_POINT), address);
                state.proxies.insert(
                    address,
                    ProxyState {
                        bootstrapper: *bootstrapper,
                        owner: Address::ZERO,
                        implementations,
                        migrate_options: None,
                    },
                );
            }
            _ => {}
        }

        let record = DeployRecord {
            seq,
            deployer: sender,
            artifact,
            args,
            address,
        };
        state.contracts.insert(address, record.clone());
        state.deploy_log.push(record);

        debug!(artifact = %artifact, address = ?address, nonce, "Simulated deployment");
        Ok(DeployedContract {
            address,
            artifact,
            args,
        })
    }

    // -------------------------------------------------------------------------
    // Finalize
    // -------------------------------------------------------------------------

    fn submit_now(
        &self,
        to: Address,
        call: EntryPointCall,
        tx: &TxDefaults,
    ) -> Result<TxReceipt, TxError> {
        let sender = tx.from.unwrap_or(Address::ZERO);
        let mut state = self.state.write();
        let seq = state.next_seq();

        let outcome = Self::finalize(&mut state, sender, to, &call);
        if let Err(e) = &outcome {
            warn!(
                to = ?to,
                proxy = ?call.proxy(),
                call = call.name(),
                error = %e,
                "Simulated submission failed"
            );
        }
        state.submissions.push(SubmissionRecord {
            seq,
            sender,
            to,
            call,
            outcome: outcome.clone(),
        });
        outcome
    }

    /// Validates everything first, then applies all effects. No effect is
    /// applied when any check fails.
    fn finalize(
        state: &mut ChainState,
        sender: Address,
        to: Address,
        call: &EntryPointCall,
    ) -> Result<TxReceipt, TxError> {
        let revert = |msg: String| Err(TxError::Reverted(msg));

        if let Some(reason) = &state.finalize_rejection {
            return revert(reason.clone());
        }

        let Some(migrator) = state.migrators.get(&to) else {
            return Err(if state.contracts.contains_key(&to) {
                TxError::UnsupportedCall {
                    target: to,
                    entry_point: call.name(),
                }
            } else {
                TxError::NoContract(to)
            });
        };

        let (owner, proxy, features, options) = match call {
            EntryPointCall::InitializeProxy {
                owner,
                proxy,
                features,
            } if migrator.kind == Artifact::InitialMigration => {
                (*owner, *proxy, features.iter().collect::<Vec<_>>(), None)
            }
            EntryPointCall::MigrateProxy {
                owner,
                proxy,
                features,
                options,
            } if migrator.kind == Artifact::FullMigration => {
                (*owner, *proxy, features.iter().collect(), Some(*options))
            }
            _ => {
                return Err(TxError::UnsupportedCall {
                    target: to,
                    entry_point: call.name(),
                })
            }
        };

        if migrator.spent {
            return revert("migrator already used".to_string());
        }
        if sender != migrator.initialize_caller {
            return revert(format!("{sender:?} is not the initialize caller"));
        }
        if owner.is_zero() {
            return revert("owner is the zero address".to_string());
        }

        let Some(proxy_state) = state.proxies.get(&proxy) else {
            return Err(TxError::NoContract(proxy));
        };
        if !proxy_state.owner.is_zero() || proxy_state.bootstrapper.is_zero() {
            return revert("proxy already bootstrapped".to_string());
        }
        if proxy_state.bootstrapper != migrator.bootstrapper {
            return revert(format!(
                "proxy only accepts bootstrap from {:?}",
                proxy_state.bootstrapper
            ));
        }

        let mut registrations = Vec::new();
        for (role, address) in features {
            let Some(record) = state.contracts.get(&address) else {
                return revert(format!("{role} at {address:?} has no code"));
            };
            if record.artifact != role.artifact() {
                return revert(format!("{role} at {address:?} is a {}", record.artifact));
            }
            if let Some(bound) = record.args.bound_proxy() {
                if bound != proxy {
                    return revert(format!("{role} is bound to proxy {bound:?}"));
                }
            }
            registrations.extend(
                role.entry_points()
                    .iter()
                    .map(|sig| (Selector::of(sig), address)),
            );
        }

        // All checks passed: apply atomically.
        let nonce = state.next_nonce(sender);
        state.block_number += 1;
        let block_number = state.block_number;

        if let Some(m) = state.migrators.get_mut(&to) {
            m.spent = true;
        }
        if let Some(p) = state.proxies.get_mut(&proxy) {
            p.implementations.remove(&Selector::of(BOOTSTRAP_ENTRY_POINT));
            p.implementations.extend(registrations);
            p.owner = owner;
            p.bootstrapper = Address::ZERO;
            p.migrate_options = options;
        }

        Ok(TxReceipt {
            tx_hash: simulated_tx_hash(sender, nonce, Some(to)),
            block_number,
        })
    }

    fn view(&self, to: Address, call: ViewCall) -> Result<Address, TxError> {
        let state = self.state.read();
        let unsupported = TxError::UnsupportedCall {
            target: to,
            entry_point: call.name(),
        };
        match call {
            ViewCall::GetBootstrapper => match state.migrators.get(&to) {
                Some(m) if m.kind == Artifact::FullMigration => Ok(m.bootstrapper),
                Some(_) => Err(unsupported),
                None if state.contracts.contains_key(&to) => Err(unsupported),
                None => Err(TxError::NoContract(to)),
            },
            ViewCall::BootstrapCaller | ViewCall::Owner | ViewCall::FunctionImplementation(_) => {
                let Some(proxy) = state.proxies.get(&to) else {
                    return Err(if state.contracts.contains_key(&to) {
                        unsupported
                    } else {
                        TxError::NoContract(to)
                    });
                };
                Ok(match call {
                    ViewCall::FunctionImplementation(selector) => proxy
                        .implementations
                        .get(&selector)
                        .copied()
                        .unwrap_or(Address::ZERO),
                    ViewCall::BootstrapCaller => proxy.bootstrapper,
                    _ => proxy.owner,
                })
            }
        }
    }
}

/// Constructor arguments must have the shape the artifact's constructor takes.
fn validate_constructor(artifact: Artifact, args: &ConstructorArgs) -> Result<(), &'static str> {
    let ok = match artifact {
        migrator if migrator.is_migrator() => {
            matches!(args, ConstructorArgs::Migrator { initialize_caller } if !initialize_caller.is_zero())
        }
        Artifact::ExchangeProxy => {
            matches!(args, ConstructorArgs::Proxy { bootstrapper } if !bootstrapper.is_zero())
        }
        _ => match artifact.role() {
            Some(role) => {
                let expected = role.constructor_args(&FullFeaturesDeployConfig::default());
                std::mem::discriminant(&expected) == std::mem::discriminant(args)
            }
            None => false,
        },
    };
    if ok {
        Ok(())
    } else {
        Err("constructor arguments do not match artifact")
    }
}

#[async_trait]
impl DeploymentPrimitive for InMemoryChain {
    async fn deploy(
        &self,
        artifact: Artifact,
        tx: &TxDefaults,
        args: ConstructorArgs,
    ) -> Result<DeployedContract, DeployError> {
        self.deploy_now(artifact, tx, args)
    }
}

#[async_trait]
impl TransactionSubmitter for InMemoryChain {
    async fn submit_and_await(
        &self,
        to: Address,
        call: EntryPointCall,
        tx: &TxDefaults,
    ) -> Result<TxReceipt, TxError> {
        self.submit_now(to, call, tx)
    }

    async fn call_address(&self, to: Address, call: ViewCall) -> Result<Address, TxError> {
        self.view(to, call)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::BootstrapFeatures;

    fn sender() -> Address {
        Address::repeat_byte(0x5e)
    }

    fn tx() -> TxDefaults {
        TxDefaults::from_sender(sender())
    }

    async fn deploy(chain: &InMemoryChain, artifact: Artifact, args: ConstructorArgs) -> Address {
        chain.deploy(artifact, &tx(), args).await.unwrap().address
    }

    async fn bootstrap_fixture(chain: &InMemoryChain) -> (Address, Address, BootstrapFeatures) {
        let migrator = deploy(
            chain,
            Artifact::InitialMigration,
            ConstructorArgs::Migrator {
                initialize_caller: sender(),
            },
        )
        .await;
        let proxy = deploy(
            chain,
            Artifact::ExchangeProxy,
            ConstructorArgs::Proxy {
                bootstrapper: migrator,
            },
        )
        .await;
        let features = BootstrapFeatures {
            registry: deploy(chain, Artifact::SimpleFunctionRegistryFeature, ConstructorArgs::None)
                .await,
            ownable: deploy(chain, Artifact::OwnableFeature, ConstructorArgs::None).await,
        };
        (migrator, proxy, features)
    }

    #[tokio::test]
    async fn test_deploy_addresses_follow_nonce() {
        let chain = InMemoryChain::new();
        let a = deploy(&chain, Artifact::OwnableFeature, ConstructorArgs::None).await;
        let b = deploy(&chain, Artifact::OwnableFeature, ConstructorArgs::None).await;

        assert_eq!(a, compute_contract_address(sender(), 0));
        assert_eq!(b, compute_contract_address(sender(), 1));
        assert_eq!(chain.deployments().len(), 2);
    }

    #[tokio::test]
    async fn test_deploy_requires_sender() {
        let chain = InMemoryChain::new();
        let err = chain
            .deploy(Artifact::OwnableFeature, &TxDefaults::default(), ConstructorArgs::None)
            .await
            .unwrap_err();
        assert_eq!(err, DeployError::MissingSender);
    }

    #[tokio::test]
    async fn test_deploy_rejects_wrong_constructor_shape() {
        let chain = InMemoryChain::new();
        let err = chain
            .deploy(Artifact::LimitOrdersFeature, &tx(), ConstructorArgs::None)
            .await
            .unwrap_err();
        assert!(matches!(err, DeployError::Rejected { .. }));
        assert!(chain.deployments().is_empty());
    }

    #[tokio::test]
    async fn test_injected_deploy_failure() {
        let chain = InMemoryChain::new();
        chain.fail_deployments_of(Artifact::OwnableFeature, "boom");
        let err = chain
            .deploy(Artifact::OwnableFeature, &tx(), ConstructorArgs::None)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            DeployError::Rejected {
                artifact: Artifact::OwnableFeature,
                reason: "boom".to_string()
            }
        );

        chain.clear_faults();
        assert!(chain
            .deploy(Artifact::OwnableFeature, &tx(), ConstructorArgs::None)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_initialize_registers_and_transfers() {
        let chain = InMemoryChain::new();
        let (migrator, proxy, features) = bootstrap_fixture(&chain).await;
        let owner = Address::repeat_byte(0x0e);

        assert_eq!(chain.proxy_owner(proxy), Some(Address::ZERO));
        assert!(chain.registered_selectors(proxy).is_empty());
        assert_eq!(
            chain
                .call_address(proxy, ViewCall::BootstrapCaller)
                .await
                .unwrap(),
            migrator
        );

        chain
            .submit_and_await(
                migrator,
                EntryPointCall::InitializeProxy {
                    owner,
                    proxy,
                    features,
                },
                &tx(),
            )
            .await
            .unwrap();

        assert_eq!(chain.proxy_owner(proxy), Some(owner));
        assert_eq!(chain.is_spent(migrator), Some(true));
        assert_eq!(
            chain
                .call_address(proxy, ViewCall::BootstrapCaller)
                .await
                .unwrap(),
            Address::ZERO
        );
        let owner_selector = Selector::of("owner()");
        assert_eq!(
            chain
                .call_address(proxy, ViewCall::FunctionImplementation(owner_selector))
                .await
                .unwrap(),
            features.ownable
        );
    }

    #[tokio::test]
    async fn test_migrator_is_single_use() {
        let chain = InMemoryChain::new();
        let (migrator, proxy, features) = bootstrap_fixture(&chain).await;
        let call = EntryPointCall::InitializeProxy {
            owner: Address::repeat_byte(1),
            proxy,
            features,
        };

        chain.submit_and_await(migrator, call.clone(), &tx()).await.unwrap();
        let err = chain.submit_and_await(migrator, call, &tx()).await.unwrap_err();
        assert!(matches!(err, TxError::Reverted(_)));
        assert_eq!(chain.submissions().len(), 2);
    }

    #[tokio::test]
    async fn test_only_initialize_caller_may_finalize() {
        let chain = InMemoryChain::new();
        let (migrator, proxy, features) = bootstrap_fixture(&chain).await;
        let intruder = TxDefaults::from_sender(Address::repeat_byte(0x66));

        let err = chain
            .submit_and_await(
                migrator,
                EntryPointCall::InitializeProxy {
                    owner: Address::repeat_byte(0x66),
                    proxy,
                    features,
                },
                &intruder,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, TxError::Reverted(_)));
        assert_eq!(chain.proxy_owner(proxy), Some(Address::ZERO));
    }

    #[tokio::test]
    async fn test_rejected_finalize_changes_nothing() {
        let chain = InMemoryChain::new();
        let (migrator, proxy, features) = bootstrap_fixture(&chain).await;
        chain.reject_finalize("simulated revert");

        let err = chain
            .submit_and_await(
                migrator,
                EntryPointCall::InitializeProxy {
                    owner: Address::repeat_byte(1),
                    proxy,
                    features,
                },
                &tx(),
            )
            .await
            .unwrap_err();

        assert_eq!(err, TxError::Reverted("simulated revert".to_string()));
        assert_eq!(chain.proxy_owner(proxy), Some(Address::ZERO));
        assert!(chain.registered_selectors(proxy).is_empty());
        assert_eq!(chain.is_spent(migrator), Some(false));
    }

    #[tokio::test]
    async fn test_wrong_feature_artifact_reverts() {
        let chain = InMemoryChain::new();
        let (migrator, proxy, features) = bootstrap_fixture(&chain).await;
        let swapped = BootstrapFeatures {
            registry: features.ownable,
            ownable: features.registry,
        };

        let err = chain
            .submit_and_await(
                migrator,
                EntryPointCall::InitializeProxy {
                    owner: Address::repeat_byte(1),
                    proxy,
                    features: swapped,
                },
                &tx(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, TxError::Reverted(_)));
    }

    #[tokio::test]
    async fn test_full_migrator_reports_child_bootstrapper() {
        let chain = InMemoryChain::new();
        let migrator = deploy(
            &chain,
            Artifact::FullMigration,
            ConstructorArgs::Migrator {
                initialize_caller: sender(),
            },
        )
        .await;

        let bootstrapper = chain
            .call_address(migrator, ViewCall::GetBootstrapper)
            .await
            .unwrap();
        assert_eq!(bootstrapper, compute_contract_address(migrator, 1));

        let initial = deploy(
            &chain,
            Artifact::InitialMigration,
            ConstructorArgs::Migrator {
                initialize_caller: sender(),
            },
        )
        .await;
        assert!(matches!(
            chain.call_address(initial, ViewCall::GetBootstrapper).await,
            Err(TxError::UnsupportedCall { .. })
        ));
        assert!(matches!(
            chain
                .call_address(Address::repeat_byte(0x99), ViewCall::Owner)
                .await,
            Err(TxError::NoContract(_))
        ));
    }
}
