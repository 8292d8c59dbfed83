//! # Proxy Handles
//!
//! Typed handles to a finalized proxy. The type parameter records which
//! feature set was registered, so a caller holding a [`FullProxy`] can rely on
//! the complete entry-point surface while a [`BootstrappedProxy`] only
//! promises the registry and ownership functions.

use crate::domain::entities::{FeatureRole, TxReceipt};
use crate::domain::value_objects::{Address, Selector};
use serde::Serialize;
use std::marker::PhantomData;

/// A set of feature roles registered on a proxy.
pub trait ProxySurface: Send + Sync + 'static {
    /// Short name used in logs.
    const NAME: &'static str;
    /// Roles registered by the migration that produced the handle.
    const ROLES: &'static [FeatureRole];
}

/// Registry and ownable only.
#[derive(Debug, Clone, Copy)]
pub struct BootstrapSurface;

impl ProxySurface for BootstrapSurface {
    const NAME: &'static str = "bootstrap";
    const ROLES: &'static [FeatureRole] = &FeatureRole::BOOTSTRAP;
}

/// Every feature.
#[derive(Debug, Clone, Copy)]
pub struct FullSurface;

impl ProxySurface for FullSurface {
    const NAME: &'static str = "full";
    const ROLES: &'static [FeatureRole] = &FeatureRole::FULL;
}

/// Handle to an operable proxy. Only produced after a confirmed finalize.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyHandle<S: ProxySurface> {
    address: Address,
    owner: Address,
    finalized_in: TxReceipt,
    #[serde(skip)]
    _surface: PhantomData<S>,
}

/// Handle returned by the bootstrap migration.
pub type BootstrappedProxy = ProxyHandle<BootstrapSurface>;

/// Handle returned by the full migration.
pub type FullProxy = ProxyHandle<FullSurface>;

impl<S: ProxySurface> ProxyHandle<S> {
    pub(crate) fn new(address: Address, owner: Address, finalized_in: TxReceipt) -> Self {
        Self {
            address,
            owner,
            finalized_in,
            _surface: PhantomData,
        }
    }

    /// Proxy address.
    #[must_use]
    pub fn address(&self) -> Address {
        self.address
    }

    /// Owner fixed by finalize.
    #[must_use]
    pub fn owner(&self) -> Address {
        self.owner
    }

    /// Receipt of the finalize transaction.
    #[must_use]
    pub fn finalized_in(&self) -> TxReceipt {
        self.finalized_in
    }

    /// Name of the registered surface, `bootstrap` or `full`.
    #[must_use]
    pub fn surface(&self) -> &'static str {
        S::NAME
    }

    /// Registered roles.
    #[must_use]
    pub fn roles(&self) -> &'static [FeatureRole] {
        S::ROLES
    }

    /// Every registered entry point with the role that implements it.
    pub fn entry_points(&self) -> impl Iterator<Item = (FeatureRole, &'static str)> {
        S::ROLES
            .iter()
            .flat_map(|role| role.entry_points().iter().map(move |sig| (*role, *sig)))
    }

    /// True if `signature` is part of this handle's surface.
    #[must_use]
    pub fn supports(&self, signature: &str) -> bool {
        let selector = Selector::of(signature);
        self.entry_points()
            .any(|(_, sig)| Selector::of(sig) == selector)
    }
}

impl From<FullProxy> for BootstrappedProxy {
    fn from(full: FullProxy) -> Self {
        Self::new(full.address, full.owner, full.finalized_in)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::Hash;

    fn receipt() -> TxReceipt {
        TxReceipt {
            tx_hash: Hash::new([1u8; 32]),
            block_number: 1,
        }
    }

    #[test]
    fn test_full_surface_is_superset() {
        let proxy = Address::repeat_byte(1);
        let owner = Address::repeat_byte(2);
        let full = FullProxy::new(proxy, owner, receipt());
        let bootstrap = BootstrappedProxy::from(full);

        for (_, sig) in bootstrap.entry_points() {
            assert!(full.supports(sig));
        }
        assert!(full.supports("getProtocolFeeMultiplier()"));
        assert!(!bootstrap.supports("getProtocolFeeMultiplier()"));
        assert!(bootstrap.supports("transferOwnership(address)"));
        assert_eq!(bootstrap.address(), proxy);
        assert_eq!(bootstrap.owner(), owner);
    }

    #[test]
    fn test_roles() {
        let handle = BootstrappedProxy::new(Address::repeat_byte(1), Address::repeat_byte(2), receipt());
        assert_eq!(handle.roles(), &FeatureRole::BOOTSTRAP);
        assert_eq!(handle.surface(), "bootstrap");
        assert_eq!(
            handle.entry_points().count(),
            FeatureRole::Registry.entry_points().len() + FeatureRole::Ownable.entry_points().len()
        );
    }
}
