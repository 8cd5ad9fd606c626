//! # Ports Module
//!
//! Hexagonal architecture ports (interfaces).

pub mod inbound;
pub mod outbound;

pub use inbound::*;
pub use outbound::*;
