//! # Domain Invariants
//!
//! Checks that must hold before a finalize call is submitted. Each returns a
//! [`ConfigError`] describing the first violation, so a failing migration is
//! rejected before any ownership can change hands.
//!
//! | Invariant | Check |
//! |-----------|-------|
//! | Owner is a real account | [`check_owner`] |
//! | Every role resolved | [`check_roles_resolved`] |
//! | Proxy bound to the expected authority | [`check_proxy_binding`] |
//! | Bootstrapper usable | [`check_bootstrapper`] |
//! | Dependent features bound to this proxy | [`check_dependent_binding`] |

use crate::domain::entities::{ConstructorArgs, FeatureRole};
use crate::domain::value_objects::Address;
use crate::errors::ConfigError;

/// The final owner must not be the zero address.
///
/// # Errors
///
/// [`ConfigError::ZeroOwner`].
pub fn check_owner(owner: Address) -> Result<(), ConfigError> {
    if owner.is_zero() {
        return Err(ConfigError::ZeroOwner);
    }
    Ok(())
}

/// Every role referenced by a finalize call resolved to a non-zero address.
///
/// # Errors
///
/// [`ConfigError::UnresolvedRole`] naming the first unresolved role.
pub fn check_roles_resolved(
    features: impl IntoIterator<Item = (FeatureRole, Address)>,
) -> Result<(), ConfigError> {
    match features.into_iter().find(|(_, addr)| addr.is_zero()) {
        Some((role, _)) => Err(ConfigError::UnresolvedRole(role)),
        None => Ok(()),
    }
}

/// The bootstrap caller read back from the proxy is `expected`.
///
/// # Errors
///
/// [`ConfigError::BindingMismatch`] if the proxy trusts anyone else, or no
/// one (already bootstrapped).
pub fn check_proxy_binding(expected: Address, observed: Address) -> Result<(), ConfigError> {
    if observed.is_zero() || observed != expected {
        return Err(ConfigError::BindingMismatch {
            expected,
            actual: observed,
        });
    }
    Ok(())
}

/// The authority reported by a migrator is neither zero nor the sender.
///
/// A proxy bootstrapped by the sender directly could be finalized outside the
/// migrator.
///
/// # Errors
///
/// [`ConfigError::InvalidBootstrapper`].
pub fn check_bootstrapper(
    migrator: Address,
    bootstrapper: Address,
    sender: Address,
) -> Result<(), ConfigError> {
    if bootstrapper.is_zero() || bootstrapper == sender {
        return Err(ConfigError::InvalidBootstrapper {
            migrator,
            bootstrapper,
        });
    }
    Ok(())
}

/// A dependent feature deployed in this invocation carries this proxy.
///
/// `args` are the constructor arguments the execution environment reports for
/// the deployed instance.
///
/// # Errors
///
/// [`ConfigError::ProxyMismatch`].
pub fn check_dependent_binding(
    role: FeatureRole,
    args: &ConstructorArgs,
    proxy: Address,
) -> Result<(), ConfigError> {
    match args.bound_proxy() {
        Some(actual) if actual != proxy => Err(ConfigError::ProxyMismatch {
            role,
            expected: proxy,
            actual,
        }),
        Some(_) => Ok(()),
        None if role.requires_proxy() => Err(ConfigError::ProxyMismatch {
            role,
            expected: proxy,
            actual: Address::ZERO,
        }),
        None => Ok(()),
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owner() {
        assert_eq!(check_owner(Address::ZERO), Err(ConfigError::ZeroOwner));
        assert!(check_owner(Address::repeat_byte(1)).is_ok());
    }

    #[test]
    fn test_roles_resolved_reports_first_gap() {
        let features = [
            (FeatureRole::Registry, Address::repeat_byte(1)),
            (FeatureRole::Ownable, Address::ZERO),
            (FeatureRole::TokenSpender, Address::ZERO),
        ];
        assert_eq!(
            check_roles_resolved(features),
            Err(ConfigError::UnresolvedRole(FeatureRole::Ownable))
        );
        assert!(check_roles_resolved(features[..1].iter().copied()).is_ok());
    }

    #[test]
    fn test_proxy_binding() {
        let migrator = Address::repeat_byte(2);
        assert!(check_proxy_binding(migrator, migrator).is_ok());
        assert_eq!(
            check_proxy_binding(migrator, Address::repeat_byte(3)),
            Err(ConfigError::BindingMismatch {
                expected: migrator,
                actual: Address::repeat_byte(3),
            })
        );
        assert!(check_proxy_binding(Address::ZERO, Address::ZERO).is_err());
    }

    #[test]
    fn test_bootstrapper() {
        let migrator = Address::repeat_byte(1);
        let sender = Address::repeat_byte(2);
        assert!(check_bootstrapper(migrator, Address::repeat_byte(3), sender).is_ok());
        assert!(check_bootstrapper(migrator, Address::ZERO, sender).is_err());
        assert!(check_bootstrapper(migrator, sender, sender).is_err());
    }

    #[test]
    fn test_dependent_binding() {
        let proxy = Address::repeat_byte(7);
        let good = ConstructorArgs::MetaTransactions { proxy };
        let stale = ConstructorArgs::MetaTransactions {
            proxy: Address::repeat_byte(8),
        };

        assert!(check_dependent_binding(FeatureRole::MetaTransactions, &good, proxy).is_ok());
        assert!(matches!(
            check_dependent_binding(FeatureRole::MetaTransactions, &stale, proxy),
            Err(ConfigError::ProxyMismatch { .. })
        ));
        assert!(check_dependent_binding(FeatureRole::Registry, &ConstructorArgs::None, proxy).is_ok());
        assert!(
            check_dependent_binding(FeatureRole::LimitOrders, &ConstructorArgs::None, proxy)
                .is_err()
        );
    }
}
