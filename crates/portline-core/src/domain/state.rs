//! # Port State Machine
//!
//! ```text
//! Created -> Active -> {Paused <-> Active} -> Consumed | Expired | Deleted
//! ```
//!
//! `Deleted` is terminal. Single-use ports never leave `Deleted`; multi-use
//! ports return from `Consumed` to `Active`.

use super::entities::{GeneratedPort, ReadPortRecord};
use super::value_objects::{PortId, PortKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a generated or read record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortState {
    /// Persisted, not yet shared.
    Created,
    /// Accepting connections.
    Active,
    /// Refusing connections until resumed.
    Paused,
    /// A connection was just formed.
    Consumed,
    /// Past its expiry.
    Expired,
    /// Removed with its crypto session and permissions.
    Deleted,
}

impl PortState {
    /// Check whether a transition is legal.
    ///
    /// `multi_use` ports may return from `Consumed` to `Active`.
    pub fn can_transition_to(&self, next: PortState, multi_use: bool) -> bool {
        use PortState::*;
        match (self, next) {
            (Deleted, _) => false,
            (_, Deleted) => true,
            (Created, Active) => true,
            (Active, Paused) | (Paused, Active) => true,
            (Active, Consumed) | (Active, Expired) => true,
            (Paused, Expired) => true,
            (Consumed, Active) => multi_use,
            (Consumed, Paused) => multi_use,
            _ => false,
        }
    }

    /// Whether connections are accepted in this state.
    pub fn accepts_connections(&self) -> bool {
        matches!(self, PortState::Active)
    }
}

/// Current state of a generated record.
pub fn generated_state(port: &GeneratedPort, now: DateTime<Utc>) -> PortState {
    if port.expiry_timestamp().is_some_and(|expiry| expiry <= now) {
        return PortState::Expired;
    }
    let paused = match port {
        GeneratedPort::Superport(r) => r.paused || r.connections_made >= r.connections_limit,
        GeneratedPort::GroupSuperport(r) => {
            r.paused || r.connections_limit.is_some_and(|l| r.connections_made >= l)
        }
        GeneratedPort::ContactPort(r) => r.paused,
        _ => false,
    };
    if paused {
        PortState::Paused
    } else {
        PortState::Active
    }
}

/// Current state of a read record.
pub fn read_state(record: &ReadPortRecord, now: DateTime<Utc>) -> PortState {
    if record.is_expired(now) {
        PortState::Expired
    } else {
        PortState::Active
    }
}


/// Listing entry of a generated direct port or superport.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortSummary {
    /// Port id.
    pub port_id: PortId,
    /// Direct port or superport.
    pub kind: PortKind,
    /// Label for created contacts.
    pub label: Option<String>,
    /// Current state.
    pub state: PortState,
    /// Creation time.
    pub created_on: DateTime<Utc>,
    /// Successful connections, for superports.
    pub connections_made: Option<u32>,
    /// Usage limit, for superports.
    pub connections_limit: Option<u32>,
}

impl PortSummary {
    /// Summary of a direct port or superport; other kinds are not listed.
    pub fn of(port: &GeneratedPort, now: DateTime<Utc>) -> Option<Self> {
        let state = generated_state(port, now);
        match port {
            GeneratedPort::Direct(r) => Some(Self {
                port_id: r.port_id.clone(),
                kind: PortKind::Direct,
                label: r.label.clone(),
                state,
                created_on: r.created_on,
                connections_made: None,
                connections_limit: None,
            }),
            GeneratedPort::Superport(r) => Some(Self {
                port_id: r.port_id.clone(),
                kind: PortKind::Superport,
                label: r.label.clone(),
                state,
                created_on: r.created_on,
                connections_made: Some(r.connections_made),
                connections_limit: Some(r.connections_limit),
            }),
            _ => None,
        }
    }
}
