//! # Application Layer
//!
//! Generators and readers per kind and version, the version registry, the
//! pending-bundle sweep and the `PortService` facade.

pub(crate) mod connection;
pub mod context;
pub mod generators;
pub mod readers;
pub mod registry;
pub mod service;
pub mod sweep;

pub use context::PortContext;
pub use generators::{
    AcceptedContactPortV1, DirectPortV1, GroupPortV1, GroupSuperportV1, SharedContactPortV1,
    SuperportV1,
};
pub use readers::{parse_shared_channel, GroupReaderV1, PeerReaderV1};
pub use registry::{
    BundleVersionRegistry, GeneratorFactory, GeneratorsV1, GroupReadersV1, PeerReadersV1,
    ReaderFactory, RegistryEntry,
};
pub use service::PortService;
pub use sweep::ReadBundleSweeper;
