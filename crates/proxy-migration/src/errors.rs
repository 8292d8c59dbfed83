//! # Error Types
//!
//! All error types for proxy provisioning.

use crate::domain::entities::{Artifact, FeatureRole};
use crate::domain::value_objects::Address;
use std::fmt;
use thiserror::Error;

// =============================================================================
// DEPLOY ERRORS
// =============================================================================

/// Errors reported by the deployment primitive.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeployError {
    /// No sender identity in the transaction defaults.
    #[error("no sender identity to deploy from")]
    MissingSender,

    /// The execution environment rejected the deployment.
    #[error("deployment of {artifact} rejected: {reason}")]
    Rejected { artifact: Artifact, reason: String },

    /// The deployment reported the zero address.
    #[error("deployment of {0} returned the zero address")]
    ZeroAddress(Artifact),

    /// Transport to the execution environment failed.
    #[error("execution environment unavailable: {0}")]
    Unavailable(String),
}

// =============================================================================
// TRANSACTION ERRORS
// =============================================================================

/// Errors from submitting a transaction or performing a view call.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TxError {
    /// The transaction reverted.
    #[error("reverted: {0}")]
    Reverted(String),

    /// The target address holds no contract.
    #[error("no contract at {0:?}")]
    NoContract(Address),

    /// The target does not implement the requested entry point.
    #[error("entry point {entry_point} not supported by {target:?}")]
    UnsupportedCall {
        target: Address,
        entry_point: &'static str,
    },

    /// A confirmed finalize did not leave the proxy in the expected state.
    #[error("handoff not observed: {0}")]
    PostconditionViolated(String),

    /// Transport to the execution environment failed.
    #[error("execution environment unavailable: {0}")]
    Unavailable(String),
}

// =============================================================================
// CONFIGURATION ERRORS
// =============================================================================

/// Inputs that make a migration impossible; detected before finalize.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// No sender identity in the transaction defaults.
    #[error("transaction defaults carry no sender identity")]
    MissingSender,

    /// The final owner is the zero address.
    #[error("owner must not be the zero address")]
    ZeroOwner,

    /// A required role resolved to the zero address.
    #[error("role {0} has no address")]
    UnresolvedRole(FeatureRole),

    /// The migrator reported an unusable bootstrapper.
    #[error("migrator {migrator:?} reported invalid bootstrapper {bootstrapper:?}")]
    InvalidBootstrapper {
        migrator: Address,
        bootstrapper: Address,
    },

    /// The proxy was bound to a different authority than the one expected.
    #[error("proxy bound to {actual:?}, expected {expected:?}")]
    BindingMismatch { expected: Address, actual: Address },

    /// A dependent feature was built for a different proxy.
    #[error("{role} bound to proxy {actual:?}, expected {expected:?}")]
    ProxyMismatch {
        role: FeatureRole,
        expected: Address,
        actual: Address,
    },

    /// An environment value could not be parsed.
    #[error("invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },
}

// =============================================================================
// MIGRATION ERRORS
// =============================================================================

/// The step a deployment or query failure happened at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationStep {
    /// Deploying the transient controller.
    Migrator(Artifact),
    /// Deploying the proxy.
    Proxy,
    /// Resolving a feature role.
    Feature(FeatureRole),
    /// Querying the migrator for its bootstrapper.
    Bootstrapper,
}

impl fmt::Display for MigrationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Migrator(artifact) => write!(f, "migrator {artifact}"),
            Self::Proxy => f.write_str("proxy"),
            Self::Feature(role) => write!(f, "feature {role}"),
            Self::Bootstrapper => f.write_str("bootstrapper query"),
        }
    }
}

/// Errors that abort a migration call. Nothing usable is produced on error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MigrationError {
    /// A deployment failed.
    #[error("deployment failed at {step}: {source}")]
    Deployment {
        step: MigrationStep,
        #[source]
        source: DeployError,
    },

    /// The finalize transaction failed; the proxy is not operable.
    #[error("finalize of proxy {proxy:?} via {migrator:?} failed: {source}")]
    Finalize {
        migrator: Address,
        proxy: Address,
        #[source]
        source: TxError,
    },

    /// A view call failed.
    #[error("query failed at {step}: {source}")]
    Query {
        step: MigrationStep,
        #[source]
        source: TxError,
    },

    /// Invalid inputs, detected before finalize.
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),
}

impl MigrationError {
    /// Shorthand for a deployment failure at `step`.
    #[must_use]
    pub fn deployment(step: MigrationStep, source: DeployError) -> Self {
        Self::Deployment { step, source }
    }

    /// Returns true if the finalize step itself failed.
    #[must_use]
    pub fn is_finalize_failure(&self) -> bool {
        matches!(self, Self::Finalize { .. })
    }

    /// Role whose resolution failed, if the failure is role-specific.
    #[must_use]
    pub fn failed_role(&self) -> Option<FeatureRole> {
        match self {
            Self::Deployment {
                step: MigrationStep::Feature(role),
                ..
            } => Some(*role),
            Self::Configuration(
                ConfigError::UnresolvedRole(role) | ConfigError::ProxyMismatch { role, .. },
            ) => Some(*role),
            _ => None,
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_deployment_error_names_step() {
        let err = MigrationError::deployment(
            MigrationStep::Feature(FeatureRole::LimitOrders),
            DeployError::Rejected {
                artifact: Artifact::LimitOrdersFeature,
                reason: "out of gas".to_string(),
            },
        );
        let msg = err.to_string();
        assert!(msg.contains("feature limitOrders"));
        assert!(err.source().is_some());
        assert_eq!(err.failed_role(), Some(FeatureRole::LimitOrders));
        assert!(!err.is_finalize_failure());
    }

    #[test]
    fn test_finalize_error() {
        let err = MigrationError::Finalize {
            migrator: Address::repeat_byte(1),
            proxy: Address::repeat_byte(2),
            source: TxError::Reverted("nope".to_string()),
        };
        assert!(err.is_finalize_failure());
        assert!(err.to_string().contains("reverted: nope"));
        assert_eq!(err.failed_role(), None);
    }

    #[test]
    fn test_config_error_conversion() {
        let err: MigrationError = ConfigError::UnresolvedRole(FeatureRole::Ownable).into();
        assert!(matches!(err, MigrationError::Configuration(_)));
        assert_eq!(err.failed_role(), Some(FeatureRole::Ownable));
    }

    #[test]
    fn test_step_display() {
        assert_eq!(
            MigrationStep::Migrator(Artifact::FullMigration).to_string(),
            "migrator FullMigration"
        );
        assert_eq!(MigrationStep::Proxy.to_string(), "proxy");
    }
}
