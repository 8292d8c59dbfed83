//! # Driving Port (API - Inbound)
//!
//! The caller-facing migration API. `MigrationService` is the implementation;
//! callers that only need to provision a proxy can depend on this trait.

use crate::domain::entities::{
    BootstrapFeatures, DeployConfigOverrides, FeatureOverrides, FullFeatures, FullMigrationConfig,
    TxDefaults,
};
use crate::domain::handle::{BootstrappedProxy, FullProxy};
use crate::domain::value_objects::Address;
use crate::errors::MigrationError;
use async_trait::async_trait;

/// Provisioning operations.
///
/// Every operation either succeeds completely or fails with a
/// [`MigrationError`]; addresses deployed by a failed call must be treated as
/// unusable.
#[async_trait]
pub trait ProxyMigrationApi: Send + Sync {
    /// Deploy (or reuse) the registry and ownable features.
    async fn deploy_minimal_features(
        &self,
        tx: &TxDefaults,
        overrides: &FeatureOverrides,
    ) -> Result<BootstrapFeatures, MigrationError>;

    /// Deploy a proxy with the minimal feature set, owned by `owner`.
    async fn bootstrap_migrate(
        &self,
        owner: Address,
        tx: &TxDefaults,
        overrides: &FeatureOverrides,
    ) -> Result<BootstrappedProxy, MigrationError>;

    /// Deploy (or reuse) every feature, binding dependent ones to
    /// `config.proxy_address`.
    async fn deploy_full_features(
        &self,
        tx: &TxDefaults,
        config: &DeployConfigOverrides,
        overrides: &FeatureOverrides,
    ) -> Result<FullFeatures, MigrationError>;

    /// Deploy a fully featured proxy, owned by `owner`.
    async fn full_migrate(
        &self,
        owner: Address,
        tx: &TxDefaults,
        overrides: &FeatureOverrides,
        config: &FullMigrationConfig,
    ) -> Result<FullProxy, MigrationError>;
}
