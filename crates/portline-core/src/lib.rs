//! # Portline Core
//!
//! The Port protocol: versioned bundles that bootstrap encrypted peer
//! connections and group memberships from a QR code or a link.
//!
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//!
//! ## Purpose
//!
//! A generator owns a shareable port; a reader accepts the bundle it
//! renders and later uses it to form a connection through the remote
//! issuer. Each kind has its own wire schema per version:
//!
//! | Kind | Target | Use | Crypto |
//! |------|--------|-----|--------|
//! | Direct port | `direct` | single | yes |
//! | Superport | `superportDirect` | multi, limited | yes |
//! | Group port | `group` | single | no |
//! | Group superport | `superportGroup` | multi | no |
//! | Contact port | `contactPort` | one per ticket | yes |
//!
//! ## Handshake
//!
//! ```text
//! Reader ──intro (rad echo)──→ Issuer ──line created──→ Generator
//!   │                                                      │
//!   └── merge line into chat                merge line ────┘
//! ```
//!
//! ## Module Structure
//!
//! ```text
//! portline-core/
//! ├── domain/          # Records, bundles, errors, state machine, invariants
//! ├── algorithms/      # Bundle schemas, links, intro messages
//! ├── ports/           # Generator/Reader/API traits (inbound) + collaborators (outbound)
//! ├── application/     # Generators, readers, registry, sweep, PortService
//! ├── adapters/        # In-memory reference collaborators
//! ├── config.rs        # PortProtocolConfig
//! └── metrics.rs       # Prometheus counters (feature "metrics")
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod algorithms;
pub mod application;
pub mod config;
pub mod domain;
pub mod metrics;
pub mod ports;

// Re-exports
pub use adapters::{
    InMemoryBackend, InMemoryConnectionStore, InMemoryIssuer, InMemoryPermissionStore,
    InMemoryPortStore, IssuerCall, RecordingInfoExchange, RecordingNotifier, SessionVault,
    StaticProfile,
};
pub use algorithms::{
    bundle_to_fallback_link, inspect_tag, parse_link, short_link, ParsedLink, V1,
};
pub use application::{
    BundleVersionRegistry, GroupReaderV1, PeerReaderV1, PortContext, PortService,
    ReadBundleSweeper, AcceptedContactPortV1, DirectPortV1, GroupPortV1, GroupSuperportV1,
    SharedContactPortV1, SuperportV1,
};
pub use config::PortProtocolConfig;
pub use domain::{
    clip_name, Bundle, ConnectionRequest, GeneratedPort, GroupBundle, IntroMessage, PeerBundle,
    Permissions, PortError, PortKind, PortResult, PortState, PortSummary, ReadPortRecord,
    SweepReport, LATEST_VERSION, NAME_LENGTH_LIMIT, ORG_NAME,
};
pub use ports::{
    ConnectionStore, CreatePortRequest, CryptoCollaborator, InitialInfoExchange,
    NotificationService, PermissionStore, PortGenerator, PortLifecycleStore, PortProtocolApi,
    PortReader, ProfileProvider, RemoteIssuer,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
