//! # Bundle Version Registry
//!
//! Maps `(kind, version)` to the bundle validator and the generator and
//! reader factories of that version. Stored records are always loaded with
//! the implementation of their own version, never the current default.
//!
//! ```text
//! (direct,          1.0.0) -> validate_direct_v1          + GeneratorsV1 + PeerReadersV1
//! (superportDirect, 1.0.0) -> validate_superport_v1       + GeneratorsV1 + PeerReadersV1
//! (contactPort,     1.0.0) -> validate_contact_port_v1    + GeneratorsV1 + PeerReadersV1
//! (group,           1.0.0) -> validate_group_v1           + GeneratorsV1 + GroupReadersV1
//! (superportGroup,  1.0.0) -> validate_group_superport_v1 + GeneratorsV1 + GroupReadersV1
//! ```
//!
//! Adding a version is registering an entry.

use super::context::PortContext;
use super::generators::{
    AcceptedContactPortV1, DirectPortV1, GroupPortV1, GroupSuperportV1, SharedContactPortV1,
    SuperportV1,
};
use super::readers::{GroupReaderV1, PeerReaderV1};
use crate::algorithms::{
    inspect_tag, validate_contact_port_v1, validate_direct_v1, validate_group_superport_v1,
    validate_group_v1, validate_superport_v1, BundleValidator,
};
use crate::domain::{
    Bundle, FolderId, GeneratedPort, Permissions, PortError, PortKind, PortResult,
    ReadPortRecord, LATEST_VERSION,
};
use crate::ports::{CreatePortRequest, PortGenerator, PortReader};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error};

/// Builds generators of one version.
#[async_trait]
pub trait GeneratorFactory: Send + Sync {
    /// Create and persist a new port.
    async fn create(
        &self,
        ctx: &PortContext,
        request: CreatePortRequest,
    ) -> PortResult<Box<dyn PortGenerator>>;

    /// Wrap a persisted record.
    fn load(&self, ctx: &PortContext, record: GeneratedPort) -> PortResult<Box<dyn PortGenerator>>;
}

/// Builds readers of one version.
#[async_trait]
pub trait ReaderFactory: Send + Sync {
    /// Persist a pending record for a validated bundle.
    async fn accept(
        &self,
        ctx: &PortContext,
        bundle: &Bundle,
        permissions: Permissions,
        folder_id: Option<FolderId>,
        channel: Option<String>,
    ) -> PortResult<ReadPortRecord>;

    /// Wrap a pending record.
    fn load(&self, ctx: &PortContext, record: ReadPortRecord) -> Box<dyn PortReader>;
}

/// Generators of version 1.0.0, all kinds.
pub struct GeneratorsV1;

#[async_trait]
impl GeneratorFactory for GeneratorsV1 {
    async fn create(
        &self,
        ctx: &PortContext,
        request: CreatePortRequest,
    ) -> PortResult<Box<dyn PortGenerator>> {
        let generator: Box<dyn PortGenerator> = match request {
            CreatePortRequest::Direct {
                label,
                folder_id,
                permissions,
                expires_in,
            } => Box::new(DirectPortV1::create(ctx, label, folder_id, permissions, expires_in).await?),
            CreatePortRequest::Superport {
                label,
                limit,
                folder_id,
                permissions,
            } => Box::new(SuperportV1::create(ctx, label, limit, folder_id, permissions).await?),
            CreatePortRequest::Group {
                group_id,
                name,
                description,
            } => Box::new(GroupPortV1::create(ctx, group_id, name, description).await?),
            CreatePortRequest::GroupSuperport {
                group_id,
                name,
                description,
                limit,
                regenerate,
            } => Box::new(
                GroupSuperportV1::create(ctx, group_id, name, description, limit, regenerate)
                    .await?,
            ),
            CreatePortRequest::SharedContactPort {
                pair_hash,
                folder_id,
            } => Box::new(SharedContactPortV1::create(ctx, pair_hash, folder_id).await?),
            CreatePortRequest::AcceptedContactPort { pair_hash, bundle } => {
                Box::new(AcceptedContactPortV1::create(ctx, pair_hash, bundle).await?)
            }
        };
        Ok(generator)
    }

    fn load(&self, ctx: &PortContext, record: GeneratedPort) -> PortResult<Box<dyn PortGenerator>> {
        let generator: Box<dyn PortGenerator> = match record {
            GeneratedPort::Direct(r) => Box::new(DirectPortV1::load(ctx, r)),
            GeneratedPort::Superport(r) => Box::new(SuperportV1::load(ctx, r)),
            GeneratedPort::Group(r) => Box::new(GroupPortV1::load(ctx, r)),
            GeneratedPort::GroupSuperport(r) => Box::new(GroupSuperportV1::load(ctx, r)),
            GeneratedPort::ContactPort(r) => Box::new(SharedContactPortV1::load(ctx, r)),
            GeneratedPort::AcceptedContactPort(r) => Box::new(AcceptedContactPortV1::load(ctx, r)),
        };
        Ok(generator)
    }
}

/// Readers of direct ports, superports and contact ports, version 1.0.0.
pub struct PeerReadersV1;

#[async_trait]
impl ReaderFactory for PeerReadersV1 {
    async fn accept(
        &self,
        ctx: &PortContext,
        bundle: &Bundle,
        permissions: Permissions,
        folder_id: Option<FolderId>,
        channel: Option<String>,
    ) -> PortResult<ReadPortRecord> {
        let bundle = bundle.as_peer().ok_or_else(|| {
            PortError::Validation(format!("{} bundle carries no key material", bundle.kind()))
        })?;
        PeerReaderV1::accept(ctx, bundle, permissions, folder_id, channel).await
    }

    fn load(&self, ctx: &PortContext, record: ReadPortRecord) -> Box<dyn PortReader> {
        Box::new(PeerReaderV1::load(ctx, record))
    }
}

/// Readers of group ports and group superports, version 1.0.0.
pub struct GroupReadersV1;

#[async_trait]
impl ReaderFactory for GroupReadersV1 {
    async fn accept(
        &self,
        ctx: &PortContext,
        bundle: &Bundle,
        permissions: Permissions,
        folder_id: Option<FolderId>,
        channel: Option<String>,
    ) -> PortResult<ReadPortRecord> {
        let bundle = bundle.as_group().ok_or_else(|| {
            PortError::Validation(format!("{} bundle is not a group bundle", bundle.kind()))
        })?;
        GroupReaderV1::accept(ctx, bundle, permissions, folder_id, channel).await
    }

    fn load(&self, ctx: &PortContext, record: ReadPortRecord) -> Box<dyn PortReader> {
        Box::new(GroupReaderV1::load(ctx, record))
    }
}

/// Everything registered for one `(kind, version)`.
#[derive(Clone)]
pub struct RegistryEntry {
    /// Schema check of the version.
    pub validate: BundleValidator,
    /// Generator factory.
    pub generator: Arc<dyn GeneratorFactory>,
    /// Reader factory.
    pub reader: Arc<dyn ReaderFactory>,
}

/// `(kind, version)` registry.
#[derive(Clone, Default)]
pub struct BundleVersionRegistry {
    entries: HashMap<(PortKind, String), RegistryEntry>,
}

impl BundleVersionRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every 1.0.0 implementation.
    pub fn with_defaults() -> Self {
        let generators: Arc<dyn GeneratorFactory> = Arc::new(GeneratorsV1);
        let peers: Arc<dyn ReaderFactory> = Arc::new(PeerReadersV1);
        let groups: Arc<dyn ReaderFactory> = Arc::new(GroupReadersV1);

        let mut registry = Self::new();
        let v1: [(PortKind, BundleValidator, &Arc<dyn ReaderFactory>); 5] = [
            (PortKind::Direct, validate_direct_v1, &peers),
            (PortKind::Superport, validate_superport_v1, &peers),
            (PortKind::ContactPort, validate_contact_port_v1, &peers),
            (PortKind::Group, validate_group_v1, &groups),
            (PortKind::GroupSuperport, validate_group_superport_v1, &groups),
        ];
        for (kind, validate, reader) in v1 {
            registry.register(
                kind,
                LATEST_VERSION,
                RegistryEntry {
                    validate,
                    generator: generators.clone(),
                    reader: reader.clone(),
                },
            );
        }
        registry
    }

    /// Register (or replace) the implementation of a version.
    pub fn register(&mut self, kind: PortKind, version: &str, entry: RegistryEntry) {
        debug!(kind = %kind, version, "[portline] registering bundle version");
        self.entries.insert((kind, version.to_string()), entry);
    }

    /// Entry of a version. An absent version is unsupported.
    pub fn select(&self, kind: PortKind, version: Option<&str>) -> PortResult<&RegistryEntry> {
        version
            .and_then(|v| self.entries.get(&(kind, v.to_string())))
            .ok_or_else(|| PortError::UnsupportedVersion {
                kind,
                version: version.map(str::to_string),
            })
    }

    /// Entry used for new ports of a kind.
    pub fn latest(&self, kind: PortKind) -> PortResult<&RegistryEntry> {
        self.select(kind, Some(LATEST_VERSION))
    }

    /// Versions registered for a kind, sorted.
    pub fn versions(&self, kind: PortKind) -> Vec<String> {
        let mut versions: Vec<String> = self
            .entries
            .keys()
            .filter(|(k, _)| *k == kind)
            .map(|(_, v)| v.clone())
            .collect();
        versions.sort();
        versions
    }

    /// Validate untyped bundle JSON against the schema its tag names.
    pub fn validate_any(&self, value: &Value) -> PortResult<Bundle> {
        let (kind, version) = inspect_tag(value)?;
        let entry = self.select(kind, version.as_deref())?;
        (entry.validate)(value)
    }

    /// Create a port with the latest version, or log and return `None`.
    pub async fn create_generator(
        &self,
        ctx: &PortContext,
        request: CreatePortRequest,
    ) -> Option<Box<dyn PortGenerator>> {
        let kind = request.kind();
        match self.try_create_generator(ctx, request).await {
            Ok(generator) => Some(generator),
            Err(e) => {
                error!(kind = %kind, error = %e, "[portline] failed to create port");
                None
            }
        }
    }

    /// Create a port with the latest version.
    pub async fn try_create_generator(
        &self,
        ctx: &PortContext,
        request: CreatePortRequest,
    ) -> PortResult<Box<dyn PortGenerator>> {
        let entry = self.latest(request.kind())?;
        entry.generator.create(ctx, request).await
    }

    /// Generator for a stored record, by the record's own version.
    pub fn load_generator(
        &self,
        ctx: &PortContext,
        record: GeneratedPort,
    ) -> PortResult<Box<dyn PortGenerator>> {
        let entry = self.select(record.kind(), Some(record.version()))?;
        entry.generator.load(ctx, record)
    }

    /// Accept a validated bundle with the reader of its version.
    pub async fn try_accept(
        &self,
        ctx: &PortContext,
        bundle: &Bundle,
        permissions: Permissions,
        folder_id: Option<FolderId>,
        channel: Option<String>,
    ) -> PortResult<ReadPortRecord> {
        let entry = self.select(bundle.kind(), Some(bundle.version()))?;
        entry
            .reader
            .accept(ctx, bundle, permissions, folder_id, channel)
            .await
    }

    /// Reader for a pending record, by the record's own version.
    pub fn load_reader(
        &self,
        ctx: &PortContext,
        record: ReadPortRecord,
    ) -> PortResult<Box<dyn PortReader>> {
        let entry = self.select(record.target, Some(&record.version))?;
        Ok(entry.reader.load(ctx, record))
    }
}
