//! # Ports Layer (Middle Hexagon)
//!
//! Trait definitions between the orchestrator and the outside world.
//!
//! - **Driving Port (Inbound)**: `ProxyMigrationApi`
//! - **Driven Ports (Outbound)**: `DeploymentPrimitive`, `TransactionSubmitter`
//! - No concrete implementations in this module

pub mod inbound;
pub mod outbound;

pub use inbound::*;
pub use outbound::*;
