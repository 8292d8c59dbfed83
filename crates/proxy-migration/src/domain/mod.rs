//! # Domain Layer (Inner Hexagon)
//!
//! Pure migration concepts: roles, address sets, configuration merging and
//! the invariants a finalize call depends on.
//! NO I/O, NO async.

pub mod entities;
pub mod handle;
pub mod invariants;
pub mod services;
pub mod value_objects;

pub use entities::*;
pub use handle::*;
pub use invariants::*;
pub use services::*;
pub use value_objects::*;
