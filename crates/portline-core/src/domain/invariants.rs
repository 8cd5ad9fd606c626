//! # Domain Invariants
//!
//! Wire constants and the rules every record must satisfy.

use super::errors::{PortError, PortResult};

/// Organisation literal carried by every bundle.
pub const ORG_NAME: &str = "numberless.tech";

/// Maximum length of a bundle `name`.
pub const NAME_LENGTH_LIMIT: usize = 30;

/// Current protocol version for all kinds.
pub const LATEST_VERSION: &str = "1.0.0";

/// Length of port ids, rads and tickets in hex characters.
pub const SHORT_HEX_LEN: usize = 32;

/// Length of key hashes and public keys in hex characters.
pub const LONG_HEX_LEN: usize = 64;

/// Invariant: usage never exceeds the limit.
///
/// Reaching the limit is legal; the port must then be paused.
pub fn invariant_connections_within_limit(made: u32, limit: u32) -> PortResult<()> {
    if made > limit {
        return Err(PortError::Validation(format!(
            "connections made {} exceeds limit {}",
            made, limit
        )));
    }
    Ok(())
}

/// Invariant: a new limit cannot drop below connections already made.
pub fn invariant_limit_not_below_usage(new_limit: u32, made: u32) -> PortResult<()> {
    if new_limit < made {
        return Err(PortError::Validation(format!(
            "limit {} is below {} connections already made",
            new_limit, made
        )));
    }
    Ok(())
}

/// Invariant: names fit the wire limit.
pub fn invariant_name_length(name: &str) -> PortResult<()> {
    if name.chars().count() > NAME_LENGTH_LIMIT {
        return Err(PortError::Validation(format!(
            "name longer than {} characters",
            NAME_LENGTH_LIMIT
        )));
    }
    Ok(())
}

/// Clip a display name to the wire limit on a char boundary.
pub fn clip_name(name: &str) -> String {
    name.chars().take(NAME_LENGTH_LIMIT).collect()
}
