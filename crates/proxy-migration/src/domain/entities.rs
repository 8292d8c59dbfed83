//! # Domain Entities
//!
//! Feature roles, deployable artifacts, constructor arguments, address sets
//! and the configuration records a migration is parameterised by.

use crate::domain::value_objects::{Address, Hash, Selector, U256};
use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Protocol fee multiplier applied by the limit-orders feature unless overridden.
pub const DEFAULT_PROTOCOL_FEE_MULTIPLIER: u32 = 70_000;

// =============================================================================
// FEATURE ROLES
// =============================================================================

/// Logical name of a feature, independent of where it is deployed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FeatureRole {
    /// Function registry (`SimpleFunctionRegistryFeature`).
    Registry,
    /// Ownership management (`OwnableFeature`).
    Ownable,
    /// ERC-20 spending authority.
    TokenSpender,
    /// Transaction router (`TransformERC20Feature`).
    #[serde(rename = "transformERC20")]
    TransformErc20,
    /// Hash signature validation.
    SignatureValidator,
    /// Meta-transaction execution.
    MetaTransactions,
    /// Limit and RFQ order settlement.
    LimitOrders,
}

impl FeatureRole {
    /// Roles every operable proxy needs.
    pub const BOOTSTRAP: [FeatureRole; 2] = [Self::Registry, Self::Ownable];

    /// Roles of a fully featured proxy, in resolution order.
    pub const FULL: [FeatureRole; 7] = [
        Self::Registry,
        Self::Ownable,
        Self::TokenSpender,
        Self::TransformErc20,
        Self::SignatureValidator,
        Self::MetaTransactions,
        Self::LimitOrders,
    ];

    /// Canonical camelCase name, as used in address-set JSON.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Registry => "registry",
            Self::Ownable => "ownable",
            Self::TokenSpender => "tokenSpender",
            Self::TransformErc20 => "transformERC20",
            Self::SignatureValidator => "signatureValidator",
            Self::MetaTransactions => "metaTransactions",
            Self::LimitOrders => "limitOrders",
        }
    }

    /// Artifact deployed for this role.
    #[must_use]
    pub const fn artifact(self) -> Artifact {
        match self {
            Self::Registry => Artifact::SimpleFunctionRegistryFeature,
            Self::Ownable => Artifact::OwnableFeature,
            Self::TokenSpender => Artifact::TokenSpenderFeature,
            Self::TransformErc20 => Artifact::TransformErc20Feature,
            Self::SignatureValidator => Artifact::SignatureValidatorFeature,
            Self::MetaTransactions => Artifact::MetaTransactionsFeature,
            Self::LimitOrders => Artifact::LimitOrdersFeature,
        }
    }

    /// True if the feature bakes the proxy address into its constructor and
    /// therefore cannot be deployed before the proxy exists.
    #[must_use]
    pub const fn requires_proxy(self) -> bool {
        matches!(
            self,
            Self::TransformErc20 | Self::MetaTransactions | Self::LimitOrders
        )
    }

    /// Named constructor arguments for this role under `config`.
    #[must_use]
    pub fn constructor_args(self, config: &FullFeaturesDeployConfig) -> ConstructorArgs {
        match self {
            Self::Registry | Self::Ownable | Self::TokenSpender | Self::SignatureValidator => {
                ConstructorArgs::None
            }
            Self::TransformErc20 => ConstructorArgs::TransformErc20 {
                proxy: config.proxy_address,
            },
            Self::MetaTransactions => ConstructorArgs::MetaTransactions {
                proxy: config.proxy_address,
            },
            Self::LimitOrders => ConstructorArgs::LimitOrders {
                proxy: config.proxy_address,
                weth: config.weth_address,
                staking: config.staking_address,
                protocol_fee_multiplier: config.protocol_fee_multiplier,
            },
        }
    }

    /// External entry points the feature registers on the proxy.
    #[must_use]
    pub const fn entry_points(self) -> &'static [&'static str] {
        match self {
            Self::Registry => &[
                "rollback(bytes4,address)",
                "extend(bytes4,address)",
                "getRollbackLength(bytes4)",
                "getRollbackEntryAtIndex(bytes4,uint256)",
            ],
            Self::Ownable => &[
                "transferOwnership(address)",
                "owner()",
                "migrate(address,bytes,address)",
            ],
            Self::TokenSpender => &[
                "_spendERC20Tokens(address,address,address,uint256)",
                "getAllowanceTarget()",
                "getSpendableERC20BalanceOf(address,address)",
            ],
            Self::TransformErc20 => &[
                "transformERC20(address,address,uint256,uint256,(uint32,bytes)[])",
                "createTransformWallet()",
                "getTransformWallet()",
                "setTransformerDeployer(address)",
                "getTransformerDeployer()",
                "setQuoteSigner(address)",
                "getQuoteSigner()",
            ],
            Self::SignatureValidator => &[
                "validateHashSignature(bytes32,address,bytes)",
                "isValidHashSignature(bytes32,address,bytes)",
            ],
            Self::MetaTransactions => &[
                "executeMetaTransaction((address,address,uint256,uint256,uint256,uint256,bytes,uint256,address,uint256),(uint8,uint8,bytes32,bytes32))",
                "batchExecuteMetaTransactions((address,address,uint256,uint256,uint256,uint256,bytes,uint256,address,uint256)[],(uint8,uint8,bytes32,bytes32)[])",
                "getMetaTransactionExecutedBlock((address,address,uint256,uint256,uint256,uint256,bytes,uint256,address,uint256))",
                "getMetaTransactionHashExecutedBlock(bytes32)",
                "getMetaTransactionHash((address,address,uint256,uint256,uint256,uint256,bytes,uint256,address,uint256))",
            ],
            Self::LimitOrders => &[
                "fillLimitOrder((address,address,uint128,uint128,uint128,address,address,address,address,bytes32,uint64,uint256),(uint8,uint8,bytes32,bytes32),uint128)",
                "fillRfqOrder((address,address,uint128,uint128,address,address,address,bytes32,uint64,uint256),(uint8,uint8,bytes32,bytes32),uint128)",
                "cancelLimitOrder((address,address,uint128,uint128,uint128,address,address,address,address,bytes32,uint64,uint256))",
                "cancelRfqOrder((address,address,uint128,uint128,address,address,address,bytes32,uint64,uint256))",
                "getProtocolFeeMultiplier()",
            ],
        }
    }

    /// Selector of the first entry point; used to check registration.
    #[must_use]
    pub fn entry_selector(self) -> Selector {
        Selector::of(self.entry_points()[0])
    }
}

impl fmt::Display for FeatureRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// ARTIFACTS
// =============================================================================

/// Identifier of a build artifact the deployment primitive knows how to deploy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Artifact {
    /// Transient controller for the bootstrap migration.
    InitialMigration,
    /// Transient controller for the full migration.
    FullMigration,
    /// The proxy itself.
    ExchangeProxy,
    /// Registry feature.
    SimpleFunctionRegistryFeature,
    /// Ownable feature.
    OwnableFeature,
    /// Token spender feature.
    TokenSpenderFeature,
    /// Transform ERC-20 feature.
    TransformErc20Feature,
    /// Signature validator feature.
    SignatureValidatorFeature,
    /// Meta-transactions feature.
    MetaTransactionsFeature,
    /// Limit orders feature.
    LimitOrdersFeature,
}

impl Artifact {
    /// Feature role this artifact implements, if it is a feature.
    #[must_use]
    pub fn role(self) -> Option<FeatureRole> {
        FeatureRole::FULL.into_iter().find(|r| r.artifact() == self)
    }

    /// True for the two transient controller artifacts.
    #[must_use]
    pub const fn is_migrator(self) -> bool {
        matches!(self, Self::InitialMigration | Self::FullMigration)
    }
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

// =============================================================================
// CONSTRUCTOR ARGUMENTS
// =============================================================================

/// Constructor arguments, one named-field variant per constructor shape.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConstructorArgs {
    /// No constructor arguments.
    None,
    /// Transient controller: the only account allowed to trigger finalize.
    Migrator { initialize_caller: Address },
    /// Proxy: the only account allowed to bootstrap it.
    Proxy { bootstrapper: Address },
    /// Transform ERC-20 feature.
    TransformErc20 { proxy: Address },
    /// Meta-transactions feature.
    MetaTransactions { proxy: Address },
    /// Limit orders feature.
    LimitOrders {
        proxy: Address,
        weth: Address,
        staking: Address,
        protocol_fee_multiplier: u32,
    },
}

impl ConstructorArgs {
    /// Proxy address baked into a dependent feature, if any.
    #[must_use]
    pub fn bound_proxy(&self) -> Option<Address> {
        match self {
            Self::TransformErc20 { proxy }
            | Self::MetaTransactions { proxy }
            | Self::LimitOrders { proxy, .. } => Some(*proxy),
            _ => None,
        }
    }
}

/// A freshly deployed contract, as reported by the execution environment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct DeployedContract {
    /// Address of the new instance.
    pub address: Address,
    /// Artifact it was built from.
    pub artifact: Artifact,
    /// Constructor arguments the instance was actually built with.
    pub args: ConstructorArgs,
}

// =============================================================================
// ADDRESS SETS
// =============================================================================

/// Addresses of the minimum features of a proxy deployment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BootstrapFeatures {
    /// Function registry feature.
    pub registry: Address,
    /// Ownable feature.
    pub ownable: Address,
}

impl BootstrapFeatures {
    /// Iterates `(role, address)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (FeatureRole, Address)> {
        [
            (FeatureRole::Registry, self.registry),
            (FeatureRole::Ownable, self.ownable),
        ]
        .into_iter()
    }
}

/// Addresses of every feature of a full proxy deployment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FullFeatures {
    /// Function registry feature.
    pub registry: Address,
    /// Ownable feature.
    pub ownable: Address,
    /// Token spender feature.
    pub token_spender: Address,
    /// Transform ERC-20 feature.
    #[serde(rename = "transformERC20")]
    pub transform_erc20: Address,
    /// Signature validator feature.
    pub signature_validator: Address,
    /// Meta-transactions feature.
    pub meta_transactions: Address,
    /// Limit orders feature.
    pub limit_orders: Address,
}

impl FullFeatures {
    /// Address resolved for `role`.
    #[must_use]
    pub fn get(&self, role: FeatureRole) -> Address {
        match role {
            FeatureRole::Registry => self.registry,
            FeatureRole::Ownable => self.ownable,
            FeatureRole::TokenSpender => self.token_spender,
            FeatureRole::TransformErc20 => self.transform_erc20,
            FeatureRole::SignatureValidator => self.signature_validator,
            FeatureRole::MetaTransactions => self.meta_transactions,
            FeatureRole::LimitOrders => self.limit_orders,
        }
    }

    /// Iterates `(role, address)` pairs in resolution order.
    pub fn iter(&self) -> impl Iterator<Item = (FeatureRole, Address)> + '_ {
        FeatureRole::FULL
            .into_iter()
            .map(move |role| (role, self.get(role)))
    }
}

/// Already-deployed feature addresses supplied by the caller.
///
/// A role with no entry, or a zero entry, is deployed fresh.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureOverrides(BTreeMap<FeatureRole, Address>);

impl FeatureOverrides {
    /// No overrides: every role is deployed.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Adds an override for `role`.
    #[must_use]
    pub fn with(mut self, role: FeatureRole, address: Address) -> Self {
        self.0.insert(role, address);
        self
    }

    /// Usable override for `role`; zero counts as absent.
    #[must_use]
    pub fn get(&self, role: FeatureRole) -> Option<Address> {
        self.0.get(&role).copied().filter(|a| !a.is_zero())
    }

    /// Roles with a usable override.
    pub fn roles(&self) -> impl Iterator<Item = FeatureRole> + '_ {
        self.0
            .iter()
            .filter(|(_, a)| !a.is_zero())
            .map(|(role, _)| *role)
    }
}

// =============================================================================
// CONFIGURATION
// =============================================================================

/// Environment parameters for deploying the full feature set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FullFeaturesDeployConfig {
    /// Proxy the dependent features are bound to.
    pub proxy_address: Address,
    /// Wrapped native asset used by limit orders.
    pub weth_address: Address,
    /// Staking system receiving protocol fees.
    pub staking_address: Address,
    /// Protocol fee multiplier.
    pub protocol_fee_multiplier: u32,
}

impl Default for FullFeaturesDeployConfig {
    fn default() -> Self {
        Self {
            proxy_address: Address::ZERO,
            weth_address: Address::ZERO,
            staking_address: Address::ZERO,
            protocol_fee_multiplier: DEFAULT_PROTOCOL_FEE_MULTIPLIER,
        }
    }
}

impl FullFeaturesDeployConfig {
    /// Shallow merge: each overridden field wins, the rest keep the default.
    #[must_use]
    pub fn merged(overrides: &DeployConfigOverrides) -> Self {
        let defaults = Self::default();
        Self {
            proxy_address: overrides.proxy_address.unwrap_or(defaults.proxy_address),
            weth_address: overrides.weth_address.unwrap_or(defaults.weth_address),
            staking_address: overrides
                .staking_address
                .unwrap_or(defaults.staking_address),
            protocol_fee_multiplier: overrides
                .protocol_fee_multiplier
                .unwrap_or(defaults.protocol_fee_multiplier),
        }
    }

    /// Copy bound to `proxy`.
    #[must_use]
    pub fn with_proxy(self, proxy: Address) -> Self {
        Self {
            proxy_address: proxy,
            ..self
        }
    }
}

/// Caller-supplied partial deploy configuration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
#[allow(missing_docs)]
pub struct DeployConfigOverrides {
    pub proxy_address: Option<Address>,
    pub weth_address: Option<Address>,
    pub staking_address: Option<Address>,
    pub protocol_fee_multiplier: Option<u32>,
}

/// Caller-supplied configuration for a full migration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FullMigrationConfig {
    /// Deploy parameters; `proxy_address` is replaced by the new proxy.
    #[serde(flatten)]
    pub deploy: DeployConfigOverrides,
    /// Deployer of record for transformers. Defaults to the sender.
    pub transformer_deployer: Option<Address>,
}

/// Options passed to the full migrator's finalize entry point.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrateOptions {
    /// Merged deploy configuration, bound to the proxy being finalized.
    #[serde(flatten)]
    pub config: FullFeaturesDeployConfig,
    /// Account allowed to deploy transformers.
    pub transformer_deployer: Address,
}

// =============================================================================
// TRANSACTIONS
// =============================================================================

/// Defaults applied to every deployment and submission of a migration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TxDefaults {
    /// Sender identity. Required by every migration.
    pub from: Option<Address>,
    /// Gas limit per transaction.
    pub gas_limit: Option<u64>,
    /// Gas price per transaction.
    pub gas_price: Option<U256>,
}

impl TxDefaults {
    /// Defaults sending from `sender`.
    #[must_use]
    pub fn from_sender(sender: Address) -> Self {
        Self {
            from: Some(sender),
            ..Self::default()
        }
    }

    /// The sender identity.
    ///
    /// # Errors
    ///
    /// [`ConfigError::MissingSender`] if `from` is unset or zero.
    pub fn sender(&self) -> Result<Address, ConfigError> {
        self.from
            .filter(|a| !a.is_zero())
            .ok_or(ConfigError::MissingSender)
    }
}

/// Receipt of a confirmed transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TxReceipt {
    /// Transaction hash.
    pub tx_hash: Hash,
    /// Block the transaction was included in.
    pub block_number: u64,
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_roles_cover_bootstrap() {
        for role in FeatureRole::BOOTSTRAP {
            assert!(FeatureRole::FULL.contains(&role));
            assert!(!role.requires_proxy());
        }
    }

    #[test]
    fn test_dependent_roles() {
        let dependent: Vec<_> = FeatureRole::FULL
            .into_iter()
            .filter(|r| r.requires_proxy())
            .collect();
        assert_eq!(
            dependent,
            vec![
                FeatureRole::TransformErc20,
                FeatureRole::MetaTransactions,
                FeatureRole::LimitOrders
            ]
        );
    }

    #[test]
    fn test_artifact_role_mapping() {
        for role in FeatureRole::FULL {
            assert_eq!(role.artifact().role(), Some(role));
        }
        assert_eq!(Artifact::ExchangeProxy.role(), None);
        assert!(Artifact::FullMigration.is_migrator());
        assert!(!Artifact::ExchangeProxy.is_migrator());
    }

    #[test]
    fn test_constructor_args_are_named() {
        let proxy = Address::repeat_byte(9);
        let config = FullFeaturesDeployConfig::default().with_proxy(proxy);

        assert_eq!(
            FeatureRole::LimitOrders.constructor_args(&config),
            ConstructorArgs::LimitOrders {
                proxy,
                weth: Address::ZERO,
                staking: Address::ZERO,
                protocol_fee_multiplier: 70_000,
            }
        );
        assert_eq!(
            FeatureRole::TokenSpender.constructor_args(&config),
            ConstructorArgs::None
        );
        for role in FeatureRole::FULL {
            let bound = role.constructor_args(&config).bound_proxy();
            assert_eq!(bound.is_some(), role.requires_proxy());
        }
    }

    #[test]
    fn test_entry_point_selectors_are_unique() {
        let mut seen = std::collections::HashSet::new();
        for role in FeatureRole::FULL {
            for sig in role.entry_points() {
                assert!(seen.insert(Selector::of(sig)), "duplicate selector for {sig}");
            }
        }
    }

    #[test]
    fn test_config_merge_is_shallow() {
        let staking = Address::repeat_byte(3);
        let merged = FullFeaturesDeployConfig::merged(&DeployConfigOverrides {
            staking_address: Some(staking),
            ..DeployConfigOverrides::default()
        });

        assert_eq!(merged.staking_address, staking);
        assert_eq!(merged.weth_address, Address::ZERO);
        assert_eq!(merged.proxy_address, Address::ZERO);
        assert_eq!(merged.protocol_fee_multiplier, DEFAULT_PROTOCOL_FEE_MULTIPLIER);
    }

    #[test]
    fn test_overrides_ignore_zero() {
        let overrides = FeatureOverrides::none()
            .with(FeatureRole::Registry, Address::repeat_byte(1))
            .with(FeatureRole::Ownable, Address::ZERO);

        assert_eq!(
            overrides.get(FeatureRole::Registry),
            Some(Address::repeat_byte(1))
        );
        assert_eq!(overrides.get(FeatureRole::Ownable), None);
        assert_eq!(overrides.roles().collect::<Vec<_>>(), vec![FeatureRole::Registry]);
    }

    #[test]
    fn test_tx_defaults_sender() {
        assert!(matches!(
            TxDefaults::default().sender(),
            Err(ConfigError::MissingSender)
        ));
        let sender = Address::repeat_byte(5);
        assert_eq!(TxDefaults::from_sender(sender).sender().unwrap(), sender);
    }

    #[test]
    fn test_full_features_json_names() {
        let features = FullFeatures {
            registry: Address::repeat_byte(1),
            ownable: Address::repeat_byte(2),
            token_spender: Address::repeat_byte(3),
            transform_erc20: Address::repeat_byte(4),
            signature_validator: Address::repeat_byte(5),
            meta_transactions: Address::repeat_byte(6),
            limit_orders: Address::repeat_byte(7),
        };
        let json = serde_json::to_value(features).unwrap();
        for role in FeatureRole::FULL {
            assert!(json.get(role.name()).is_some(), "missing {role}");
            assert_eq!(
                serde_json::to_value(role).unwrap(),
                serde_json::Value::String(role.name().to_string())
            );
        }
    }

    #[test]
    fn test_address_set_feeds_back_as_overrides() {
        let features = FullFeatures {
            registry: Address::repeat_byte(1),
            ownable: Address::repeat_byte(2),
            token_spender: Address::repeat_byte(3),
            transform_erc20: Address::repeat_byte(4),
            signature_validator: Address::repeat_byte(5),
            meta_transactions: Address::repeat_byte(6),
            limit_orders: Address::repeat_byte(7),
        };
        let json = serde_json::to_string(&features).unwrap();
        let overrides: FeatureOverrides = serde_json::from_str(&json).unwrap();

        for (role, address) in features.iter() {
            assert_eq!(overrides.get(role), Some(address), "{role} not carried over");
        }
    }
}
