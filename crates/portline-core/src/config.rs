//! # Port Protocol Configuration
//!
//! Tunables for port creation and link rendering. Wire literals live in
//! `domain::invariants` and are never configurable.

use serde::{Deserialize, Serialize};
use std::env;

/// Port protocol configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PortProtocolConfig {
    /// Refill the unused-port pool when fewer ids than this remain.
    pub ideal_unused_ports: usize,

    /// Lifetime of a new direct port in seconds.
    pub direct_port_expiry_secs: i64,

    /// Lifetime of a new group port in seconds.
    pub group_port_expiry_secs: i64,

    /// Contact name used when neither label nor intro name is set.
    pub default_contact_name: String,

    /// Group name used when a group bundle carries none.
    pub default_group_name: String,

    /// Folder for new chats when the caller does not pick one.
    pub default_folder_id: String,

    /// Prefix prepended to a minted bundle id to form a short link.
    pub short_link_prefix: String,

    /// Base URL of self-contained fallback links.
    pub fallback_link_prefix: String,

    /// Prefix older clients stored in front of cached bundle ids.
    pub legacy_bundle_prefix: String,
}

impl Default for PortProtocolConfig {
    fn default() -> Self {
        Self {
            ideal_unused_ports: 3,
            direct_port_expiry_secs: 7 * 24 * 60 * 60,
            group_port_expiry_secs: 7 * 24 * 60 * 60,
            default_contact_name: "New contact".to_string(),
            default_group_name: "New group".to_string(),
            default_folder_id: "all".to_string(),
            short_link_prefix: "https://porting.me/link/".to_string(),
            fallback_link_prefix: "https://porting.me/bundle".to_string(),
            legacy_bundle_prefix: "link://".to_string(),
        }
    }
}

impl PortProtocolConfig {
    /// Create a config for testing (tiny pool so refills are exercised).
    pub fn for_testing() -> Self {
        Self {
            ideal_unused_ports: 2,
            ..Self::default()
        }
    }

    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `PORTLINE_IDEAL_UNUSED_PORTS`: pool low-water mark (default: 3)
    /// - `PORTLINE_DIRECT_PORT_EXPIRY_SECS`: direct port lifetime (default: 7 days)
    /// - `PORTLINE_GROUP_PORT_EXPIRY_SECS`: group port lifetime (default: 7 days)
    /// - `PORTLINE_DEFAULT_FOLDER`: folder for new chats (default: all)
    /// - `PORTLINE_SHORT_LINK_PREFIX`: short link prefix
    /// - `PORTLINE_FALLBACK_LINK_PREFIX`: fallback link base URL
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            ideal_unused_ports: env::var("PORTLINE_IDEAL_UNUSED_PORTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.ideal_unused_ports),
            direct_port_expiry_secs: env::var("PORTLINE_DIRECT_PORT_EXPIRY_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.direct_port_expiry_secs),
            group_port_expiry_secs: env::var("PORTLINE_GROUP_PORT_EXPIRY_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.group_port_expiry_secs),
            default_folder_id: env::var("PORTLINE_DEFAULT_FOLDER")
                .unwrap_or(defaults.default_folder_id),
            short_link_prefix: env::var("PORTLINE_SHORT_LINK_PREFIX")
                .unwrap_or(defaults.short_link_prefix),
            fallback_link_prefix: env::var("PORTLINE_FALLBACK_LINK_PREFIX")
                .unwrap_or(defaults.fallback_link_prefix),
            ..defaults
        }
    }

    /// Direct port lifetime.
    pub fn direct_port_expiry(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.direct_port_expiry_secs)
    }

    /// Group port lifetime.
    pub fn group_port_expiry(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.group_port_expiry_secs)
    }
}
