//! # Domain Module
//!
//! Core domain types for the Port protocol.

pub mod bundle;
pub mod entities;
pub mod errors;
pub mod invariants;
pub mod state;
pub mod value_objects;

pub use bundle::*;
pub use entities::*;
pub use errors::*;
pub use invariants::*;
pub use state::*;
pub use value_objects::*;
