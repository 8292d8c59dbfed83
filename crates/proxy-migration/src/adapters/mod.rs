//! # Adapters Layer (Outer Hexagon)
//!
//! Implementations of the driven ports.
//!
//! - `InMemoryChain`: simulated execution environment for tests and dry runs

pub mod in_memory_chain;

pub use in_memory_chain::*;
