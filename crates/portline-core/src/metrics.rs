//! # Port Protocol Metrics
//!
//! Prometheus counters for port creation, connection formation and the
//! pending-bundle sweep.
//!
//! ## Usage
//!
//! Enable with the `metrics` feature:
//! ```toml
//! portline-core = { path = "...", features = ["metrics"] }
//! ```
//!
//! ## Metrics Exported
//!
//! - `portline_ports_created_total` - Ports created (by kind)
//! - `portline_connections_formed_total` - Connections formed (by kind)
//! - `portline_use_rejected_total` - Connection attempts rejected (by reason)
//! - `portline_read_bundles_processed_total` - Pending bundles swept (by outcome)

#[cfg(feature = "metrics")]
use crate::domain::PortKind;
#[cfg(feature = "metrics")]
use lazy_static::lazy_static;
#[cfg(feature = "metrics")]
use prometheus::{register_int_counter_vec, IntCounterVec};

#[cfg(feature = "metrics")]
lazy_static! {
    /// Ports created, labeled by kind
    pub static ref PORTS_CREATED: IntCounterVec = register_int_counter_vec!(
        "portline_ports_created_total",
        "Total number of ports created",
        &["kind"]
    )
    .expect("Failed to create PORTS_CREATED metric");

    /// Connections formed, labeled by kind
    pub static ref CONNECTIONS_FORMED: IntCounterVec = register_int_counter_vec!(
        "portline_connections_formed_total",
        "Total number of connections formed through ports",
        &["kind"]
    )
    .expect("Failed to create CONNECTIONS_FORMED metric");

    /// Rejected connection attempts, labeled by reason
    pub static ref USE_REJECTED: IntCounterVec = register_int_counter_vec!(
        "portline_use_rejected_total",
        "Total number of connection attempts rejected",
        &["reason"]
    )
    .expect("Failed to create USE_REJECTED metric");

    /// Pending bundles processed by the sweep, labeled by outcome
    pub static ref READ_BUNDLES_PROCESSED: IntCounterVec = register_int_counter_vec!(
        "portline_read_bundles_processed_total",
        "Total number of pending bundles processed",
        &["outcome"]
    )
    .expect("Failed to create READ_BUNDLES_PROCESSED metric");
}

// =============================================================================
// METRIC RECORDING FUNCTIONS
// =============================================================================

/// Record a port created
#[cfg(feature = "metrics")]
pub fn record_port_created(kind: PortKind) {
    PORTS_CREATED.with_label_values(&[kind.target()]).inc();
}

/// Record a connection formed
#[cfg(feature = "metrics")]
pub fn record_connection_formed(kind: PortKind) {
    CONNECTIONS_FORMED.with_label_values(&[kind.target()]).inc();
}

/// Record a rejected connection attempt
#[cfg(feature = "metrics")]
pub fn record_use_rejected(reason: &str) {
    USE_REJECTED.with_label_values(&[reason]).inc();
}

/// Record a pending bundle processed
#[cfg(feature = "metrics")]
pub fn record_read_bundle_processed(outcome: &str) {
    READ_BUNDLES_PROCESSED.with_label_values(&[outcome]).inc();
}

// =============================================================================
// NO-OP IMPLEMENTATIONS (when metrics feature disabled)
// =============================================================================

/// Record a port created
#[cfg(not(feature = "metrics"))]
pub fn record_port_created(_kind: crate::domain::PortKind) {}

/// Record a connection formed
#[cfg(not(feature = "metrics"))]
pub fn record_connection_formed(_kind: crate::domain::PortKind) {}

/// Record a rejected connection attempt
#[cfg(not(feature = "metrics"))]
pub fn record_use_rejected(_reason: &str) {}

/// Record a pending bundle processed
#[cfg(not(feature = "metrics"))]
pub fn record_read_bundle_processed(_outcome: &str) {}
