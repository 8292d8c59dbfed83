//! # Proxy Migration - Exchange Proxy Provisioning
//!
//! Deploys an upgradeable exchange proxy and installs its initial feature set
//! through a one-shot migration contract.
//!
//! ## Flow
//!
//! 1. Deploy a transient migrator bound to the sender.
//! 2. Deploy the proxy, bound to the migrator (or the migrator's bootstrapper).
//! 3. Deploy or reuse every feature module.
//! 4. Submit one finalize call that registers the features, hands ownership
//!    to the requested owner and self-destructs the migrator.
//!
//! ## Domain Invariants
//!
//! | Invariant | Enforcement Location |
//! |-----------|---------------------|
//! | Owner is non-zero | `domain/invariants.rs` - `check_owner()` |
//! | Every role resolved before finalize | `domain/invariants.rs` - `check_roles_resolved()` |
//! | Proxy bound to the finalizing contract (read via `getBootstrapCaller`) | `domain/invariants.rs` - `check_proxy_binding()` |
//! | Bootstrapper is a distinct contract | `domain/invariants.rs` - `check_bootstrapper()` |
//! | Dependent features bound to this proxy (deployer-reported args) | `domain/invariants.rs` - `check_dependent_binding()` |
//! | Finalize is atomic | `adapters/in_memory_chain.rs` - `InMemoryChain::finalize()` |
//!
//! ## Outbound Dependencies
//!
//! | Trait | Purpose |
//! |-------|---------|
//! | `DeploymentPrimitive` | Deploy an artifact with constructor arguments |
//! | `TransactionSubmitter` | Submit finalize calls, read proxy views |
//!
//! ## Usage Example
//!
//! ```ignore
//! use proxy_migration::prelude::*;
//!
//! let (service, _chain) = create_in_memory_service(ServiceConfig::default());
//! let proxy = service
//!     .full_migrate(owner, &TxDefaults::from_sender(sender), &FeatureOverrides::none(), &FullMigrationConfig::default())
//!     .await?;
//! assert!(proxy.supports("transformERC20(address,address,uint256,uint256,(uint32,bytes)[])"));
//! ```

// Crate-level lints
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

// =============================================================================
// MODULES
// =============================================================================

pub mod adapters;
pub mod config;
pub mod domain;
pub mod errors;
pub mod ports;
pub mod resolver;
pub mod service;

// =============================================================================
// PRELUDE
// =============================================================================

/// Convenient re-exports for common usage.
pub mod prelude {
    // Domain entities
    pub use crate::domain::entities::{
        Artifact, BootstrapFeatures, ConstructorArgs, DeployConfigOverrides, DeployedContract,
        FeatureOverrides, FeatureRole, FullFeatures, FullFeaturesDeployConfig,
        FullMigrationConfig, MigrateOptions, TxDefaults, TxReceipt,
        DEFAULT_PROTOCOL_FEE_MULTIPLIER,
    };

    // Handles
    pub use crate::domain::handle::{
        BootstrapSurface, BootstrappedProxy, FullProxy, FullSurface, ProxyHandle, ProxySurface,
    };

    // Value objects
    pub use crate::domain::value_objects::{Address, Hash, Selector, U256};

    // Domain services
    pub use crate::domain::services::{compute_contract_address, keccak256};

    // Ports
    pub use crate::ports::inbound::ProxyMigrationApi;
    pub use crate::ports::outbound::{
        DeploymentPrimitive, EntryPointCall, TransactionSubmitter, ViewCall,
    };

    // Errors
    pub use crate::errors::{ConfigError, DeployError, MigrationError, MigrationStep, TxError};

    // Adapters
    pub use crate::adapters::InMemoryChain;

    // Configuration
    pub use crate::config::{MigrationMode, MigrationSettings};

    // Service
    pub use crate::resolver::{resolve_feature, Resolution};
    pub use crate::service::{
        create_in_memory_service, MigrationService, ServiceConfig, ServiceStats,
    };
}

// =============================================================================
// CRATE INFO
// =============================================================================

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Component name used in logs.
pub const COMPONENT_NAME: &str = "Proxy Migration";

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prelude_exports() {
        use prelude::*;
        let _ = ServiceConfig::default();
        let _ = Address::ZERO;
        assert_eq!(FeatureRole::FULL.len(), 7);
    }
}
