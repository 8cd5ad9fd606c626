//! Cross-user protocol flows.

pub mod support;

mod contact_port_flows;
mod direct_flows;
mod group_flows;
mod lifecycle;
