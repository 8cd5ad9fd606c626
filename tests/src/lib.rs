//! # Portline Test Suite
//!
//! Flows that span more than one user: every scenario wires two or three
//! in-memory backends to one shared issuer and drives the protocol through
//! `PortService`, the way an app would.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── support.rs          # Users, shared issuer, issuer notification relay
//!     ├── direct_flows.rs     # Direct ports and superports
//!     ├── contact_port_flows.rs # Re-sharing through tickets
//!     ├── group_flows.rs      # Group ports and group superports
//!     └── lifecycle.rs        # Sweep, cleanup, links, listing
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p portline-tests
//! cargo test -p portline-tests integration::contact_port_flows
//! ```

pub mod integration;
