//! # Driven Ports (SPI - Outbound)
//!
//! Interfaces the orchestrator depends on. The execution environment behind
//! them (a node, a simulator, a test double) is out of scope:
//! - Deploying artifacts (`DeploymentPrimitive`)
//! - Submitting and confirming entry-point calls (`TransactionSubmitter`)

use crate::domain::entities::{
    Artifact, BootstrapFeatures, ConstructorArgs, DeployedContract, FullFeatures, MigrateOptions,
    TxDefaults, TxReceipt,
};
use crate::domain::value_objects::{Address, Selector};
use crate::errors::{DeployError, TxError};
use async_trait::async_trait;

// =============================================================================
// DEPLOYMENT PRIMITIVE
// =============================================================================

/// Deploys build artifacts.
///
/// Each call produces a new instance and blocks until the deployment is
/// confirmed. Retries and timeouts belong to the implementation.
#[async_trait]
pub trait DeploymentPrimitive: Send + Sync {
    /// Deploy `artifact` with `args`, sending from `tx.from`.
    ///
    /// # Returns
    ///
    /// * `DeployedContract` - Address of the new instance and the constructor
    ///   arguments it was actually built with
    async fn deploy(
        &self,
        artifact: Artifact,
        tx: &TxDefaults,
        args: ConstructorArgs,
    ) -> Result<DeployedContract, DeployError>;
}

// =============================================================================
// TRANSACTION SUBMITTER
// =============================================================================

/// State-changing entry points the orchestrator invokes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EntryPointCall {
    /// Bootstrap finalize on an `InitialMigration` controller.
    InitializeProxy {
        owner: Address,
        proxy: Address,
        features: BootstrapFeatures,
    },
    /// Full finalize on a `FullMigration` controller.
    MigrateProxy {
        owner: Address,
        proxy: Address,
        features: FullFeatures,
        options: MigrateOptions,
    },
}

impl EntryPointCall {
    /// Entry-point name, for logs and errors.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::InitializeProxy { .. } => "initializeProxy",
            Self::MigrateProxy { .. } => "migrateProxy",
        }
    }

    /// Proxy the call finalizes.
    #[must_use]
    pub const fn proxy(&self) -> Address {
        match self {
            Self::InitializeProxy { proxy, .. } | Self::MigrateProxy { proxy, .. } => *proxy,
        }
    }
}

/// Read-only calls returning an address.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ViewCall {
    /// `FullMigration.getBootstrapper()`: the authority the proxy must trust.
    GetBootstrapper,
    /// `proxy.getBootstrapCaller()`: the only account the proxy accepts a
    /// bootstrap from; zero once bootstrapped.
    BootstrapCaller,
    /// `proxy.owner()`.
    Owner,
    /// `proxy.getFunctionImplementation(selector)`; zero when unregistered.
    FunctionImplementation(Selector),
}

impl ViewCall {
    /// Entry-point name, for logs and errors.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::GetBootstrapper => "getBootstrapper",
            Self::BootstrapCaller => "getBootstrapCaller",
            Self::Owner => "owner",
            Self::FunctionImplementation(_) => "getFunctionImplementation",
        }
    }
}

/// Submits transactions and performs view calls.
#[async_trait]
pub trait TransactionSubmitter: Send + Sync {
    /// Submit `call` to `to` and block until it is confirmed or rejected.
    async fn submit_and_await(
        &self,
        to: Address,
        call: EntryPointCall,
        tx: &TxDefaults,
    ) -> Result<TxReceipt, TxError>;

    /// Perform a read-only call returning an address.
    async fn call_address(&self, to: Address, call: ViewCall) -> Result<Address, TxError>;
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    // Deploys everything at one fixed address.
    struct FixedDeployer(Address);

    #[async_trait]
    impl DeploymentPrimitive for FixedDeployer {
        async fn deploy(
            &self,
            artifact: Artifact,
            _tx: &TxDefaults,
            args: ConstructorArgs,
        ) -> Result<DeployedContract, DeployError> {
            Ok(DeployedContract {
                address: self.0,
                artifact,
                args,
            })
        }
    }

    #[tokio::test]
    async fn test_mock_deployer() {
        let deployer = FixedDeployer(Address::repeat_byte(4));
        let deployed = deployer
            .deploy(
                Artifact::OwnableFeature,
                &TxDefaults::default(),
                ConstructorArgs::None,
            )
            .await
            .unwrap();
        assert_eq!(deployed.address, Address::repeat_byte(4));
        assert_eq!(deployed.artifact, Artifact::OwnableFeature);
    }

    #[test]
    fn test_call_names() {
        let call = EntryPointCall::InitializeProxy {
            owner: Address::repeat_byte(1),
            proxy: Address::repeat_byte(2),
            features: BootstrapFeatures {
                registry: Address::repeat_byte(3),
                ownable: Address::repeat_byte(4),
            },
        };
        assert_eq!(call.name(), "initializeProxy");
        assert_eq!(call.proxy(), Address::repeat_byte(2));
        assert_eq!(ViewCall::Owner.name(), "owner");
        assert_eq!(ViewCall::BootstrapCaller.name(), "getBootstrapCaller");
    }
}
