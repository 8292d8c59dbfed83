//! # Feature Set Resolver
//!
//! Deploy-or-reuse for a single role: an override short-circuits deployment,
//! otherwise the supplied deploy future runs exactly once. Roles resolve
//! independently of each other; ordering between batches is the
//! orchestrator's business.

use crate::domain::entities::{DeployedContract, FeatureRole};
use crate::domain::value_objects::Address;
use crate::errors::{DeployError, MigrationError, MigrationStep};
use std::future::Future;
use tracing::debug;

/// How a role obtained its address.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resolution {
    /// Caller supplied the address; nothing was deployed.
    Reused(Address),
    /// A new instance was deployed.
    Deployed(DeployedContract),
}

impl Resolution {
    /// The resolved address.
    #[must_use]
    pub fn address(&self) -> Address {
        match self {
            Self::Reused(address) => *address,
            Self::Deployed(contract) => contract.address,
        }
    }

    /// True if a deployment happened.
    #[must_use]
    pub fn was_deployed(&self) -> bool {
        matches!(self, Self::Deployed(_))
    }
}

/// Resolve `role` to an address.
///
/// A non-zero `existing` address is returned unchanged and `deploy` is never
/// polled. Otherwise `deploy` is awaited once.
///
/// # Errors
///
/// [`MigrationError::Deployment`] naming `role` if the deployment fails or
/// yields the zero address.
pub async fn resolve_feature<F, Fut>(
    role: FeatureRole,
    existing: Option<Address>,
    deploy: F,
) -> Result<Resolution, MigrationError>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<DeployedContract, DeployError>>,
{
    if let Some(address) = existing.filter(|a| !a.is_zero()) {
        debug!(role = %role, address = ?address, "Reusing supplied feature");
        return Ok(Resolution::Reused(address));
    }

    let step = MigrationStep::Feature(role);
    let contract = deploy()
        .await
        .map_err(|e| MigrationError::deployment(step, e))?;

    if contract.address.is_zero() {
        return Err(MigrationError::deployment(
            step,
            DeployError::ZeroAddress(contract.artifact),
        ));
    }

    debug!(role = %role, address = ?contract.address, "Deployed feature");
    Ok(Resolution::Deployed(contract))
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{Artifact, ConstructorArgs};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn deployed(byte: u8) -> DeployedContract {
        DeployedContract {
            address: Address::repeat_byte(byte),
            artifact: Artifact::OwnableFeature,
            args: ConstructorArgs::None,
        }
    }

    #[tokio::test]
    async fn test_override_skips_deploy() {
        let calls = AtomicUsize::new(0);
        let counter = &calls;
        let supplied = Address::repeat_byte(0xaa);

        for _ in 0..2 {
            let resolution = resolve_feature(FeatureRole::Ownable, Some(supplied), || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(deployed(1))
            })
            .await
            .unwrap();
            assert_eq!(resolution, Resolution::Reused(supplied));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_override_deploys_once() {
        let calls = AtomicUsize::new(0);
        let counter = &calls;
        let resolution = resolve_feature(FeatureRole::Ownable, None, || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(deployed(1))
        })
        .await
        .unwrap();

        assert!(resolution.was_deployed());
        assert_eq!(resolution.address(), Address::repeat_byte(1));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_zero_override_deploys() {
        let resolution = resolve_feature(FeatureRole::Registry, Some(Address::ZERO), || async {
            Ok(deployed(2))
        })
        .await
        .unwrap();
        assert!(resolution.was_deployed());
    }

    #[tokio::test]
    async fn test_failure_names_role() {
        let err = resolve_feature(FeatureRole::TokenSpender, None, || async {
            Err(DeployError::Unavailable("node down".to_string()))
        })
        .await
        .unwrap_err();
        assert_eq!(err.failed_role(), Some(FeatureRole::TokenSpender));
    }

    #[tokio::test]
    async fn test_zero_deployment_rejected() {
        let err = resolve_feature(FeatureRole::Ownable, None, || async { Ok(deployed(0)) })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            MigrationError::Deployment {
                source: DeployError::ZeroAddress(Artifact::OwnableFeature),
                ..
            }
        ));
    }
}
