//! # In-Memory Issuer
//!
//! Reference `RemoteIssuer` with failure injection. Every call can be made
//! to fail with a chosen error, which is how tests drive the transient and
//! permanent paths.

use crate::domain::{
    GroupGrant, GroupId, IntroMessage, LineGrant, LineId, PortError, PortId, PortKind,
    PortResult, RemotePort, TicketId,
};
use crate::ports::RemoteIssuer;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::debug;

/// Issuer operation, for failure injection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IssuerCall {
    /// `fetch_unused_ports` and `fetch_unused_group_ports`.
    FetchPorts,
    /// `new_superport`.
    NewSuperport,
    /// `set_superport_limit`.
    SetLimit,
    /// `new_group_superport`.
    NewGroupSuperport,
    /// `new_contact_port`.
    NewContactPort,
    /// `set_paused`.
    SetPaused,
    /// `delete_port`.
    DeletePort,
    /// `mint_bundle_id`.
    MintBundleId,
    /// `create_line` and `create_line_from_contact_port`.
    CreateLine,
    /// `join_group`.
    JoinGroup,
    /// `create_contact_port_ticket`.
    CreateTicket,
    /// `report_line_failure`.
    ReportFailure,
}

/// A line formation request as received by the issuer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LineRequest {
    /// Port kind.
    pub kind: PortKind,
    /// Port id.
    pub port_id: PortId,
    /// Ticket, for contact ports.
    pub ticket: Option<TicketId>,
    /// Intro message to forward to the generator.
    pub intro: IntroMessage,
    /// Grant returned to the reader.
    pub grant: LineGrant,
}

/// In-memory issuer.
pub struct InMemoryIssuer {
    batch_size: usize,
    failures: RwLock<HashMap<IssuerCall, PortError>>,
    grants: RwLock<VecDeque<LineGrant>>,
    paused: RwLock<HashSet<RemotePort>>,
    deleted: RwLock<HashSet<RemotePort>>,
    limits: RwLock<HashMap<PortId, u32>>,
    minted: RwLock<HashMap<String, serde_json::Value>>,
    line_requests: RwLock<Vec<LineRequest>>,
    tickets: RwLock<Vec<(PortId, TicketId, LineId)>>,
    reported: RwLock<Vec<LineId>>,
}

fn new_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

impl InMemoryIssuer {
    /// Create an issuer handing out pools of `batch_size` ids.
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size,
            failures: RwLock::new(HashMap::new()),
            grants: RwLock::new(VecDeque::new()),
            paused: RwLock::new(HashSet::new()),
            deleted: RwLock::new(HashSet::new()),
            limits: RwLock::new(HashMap::new()),
            minted: RwLock::new(HashMap::new()),
            line_requests: RwLock::new(Vec::new()),
            tickets: RwLock::new(Vec::new()),
            reported: RwLock::new(Vec::new()),
        }
    }

    /// Make every future `call` fail with `err`.
    pub fn fail(&self, call: IssuerCall, err: PortError) {
        self.failures.write().insert(call, err);
    }

    /// Stop failing `call`.
    pub fn recover(&self, call: IssuerCall) {
        self.failures.write().remove(&call);
    }

    /// Grant returned by the next line formation.
    pub fn queue_line_grant(&self, line_id: impl Into<LineId>, pair_hash: impl Into<String>) {
        self.grants.write().push_back(LineGrant {
            line_id: line_id.into(),
            pair_hash: pair_hash.into(),
        });
    }

    /// Whether a port is paused remotely.
    pub fn is_paused(&self, port: &RemotePort) -> bool {
        self.paused.read().contains(port)
    }

    /// Whether a port was deleted remotely.
    pub fn is_deleted(&self, port: &RemotePort) -> bool {
        self.deleted.read().contains(port)
    }

    /// Remote usage limit of a superport.
    pub fn limit_of(&self, port_id: &str) -> Option<u32> {
        self.limits.read().get(port_id).copied()
    }

    /// Bundle behind a minted id.
    pub fn resolve_bundle_id(&self, bundle_id: &str) -> Option<serde_json::Value> {
        self.minted.read().get(bundle_id).cloned()
    }

    /// Line formation requests, oldest first.
    pub fn line_requests(&self) -> Vec<LineRequest> {
        self.line_requests.read().clone()
    }

    /// Tickets announced to contact port owners.
    pub fn announced_tickets(&self) -> Vec<(PortId, TicketId, LineId)> {
        self.tickets.read().clone()
    }

    /// Lines reported as failed.
    pub fn reported_failures(&self) -> Vec<LineId> {
        self.reported.read().clone()
    }

    fn check(&self, call: IssuerCall) -> PortResult<()> {
        match self.failures.read().get(&call) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn next_grant(&self) -> LineGrant {
        self.grants.write().pop_front().unwrap_or_else(|| LineGrant {
            line_id: new_id(),
            pair_hash: new_id(),
        })
    }

    fn ensure_live(&self, port: &RemotePort) -> PortResult<()> {
        if self.deleted.read().contains(port) {
            return Err(PortError::PermanentIssuer(format!("{} not found", port)));
        }
        Ok(())
    }
}

impl Default for InMemoryIssuer {
    fn default() -> Self {
        Self::new(5)
    }
}

#[async_trait]
impl RemoteIssuer for InMemoryIssuer {
    async fn fetch_unused_ports(&self) -> PortResult<Vec<PortId>> {
        self.check(IssuerCall::FetchPorts)?;
        Ok((0..self.batch_size).map(|_| new_id()).collect())
    }

    async fn fetch_unused_group_ports(&self, group_id: &GroupId) -> PortResult<Vec<PortId>> {
        self.check(IssuerCall::FetchPorts)?;
        debug!(group_id = %group_id, "[portline] issuing group ports");
        Ok((0..self.batch_size).map(|_| new_id()).collect())
    }

    async fn new_superport(&self, limit: u32) -> PortResult<PortId> {
        self.check(IssuerCall::NewSuperport)?;
        let port_id = new_id();
        self.limits.write().insert(port_id.clone(), limit);
        Ok(port_id)
    }

    async fn set_superport_limit(&self, port_id: &PortId, limit: u32) -> PortResult<()> {
        self.check(IssuerCall::SetLimit)?;
        self.ensure_live(&RemotePort::Superport(port_id.clone()))?;
        self.limits.write().insert(port_id.clone(), limit);
        Ok(())
    }

    async fn new_group_superport(&self, group_id: &GroupId) -> PortResult<PortId> {
        self.check(IssuerCall::NewGroupSuperport)?;
        let port = RemotePort::GroupSuperport(group_id.clone());
        self.deleted.write().remove(&port);
        self.paused.write().remove(&port);
        Ok(new_id())
    }

    async fn new_contact_port(
        &self,
        _line_id: &LineId,
        sharing_allowed: bool,
    ) -> PortResult<PortId> {
        self.check(IssuerCall::NewContactPort)?;
        let port_id = new_id();
        if !sharing_allowed {
            self.paused
                .write()
                .insert(RemotePort::ContactPort(port_id.clone()));
        }
        Ok(port_id)
    }

    async fn set_paused(&self, port: &RemotePort, paused: bool) -> PortResult<()> {
        self.check(IssuerCall::SetPaused)?;
        self.ensure_live(port)?;
        if paused {
            self.paused.write().insert(port.clone());
        } else {
            self.paused.write().remove(port);
        }
        Ok(())
    }

    async fn delete_port(&self, port: &RemotePort) -> PortResult<()> {
        self.check(IssuerCall::DeletePort)?;
        self.ensure_live(port)?;
        self.paused.write().remove(port);
        self.deleted.write().insert(port.clone());
        Ok(())
    }

    async fn mint_bundle_id(
        &self,
        bundle: &serde_json::Value,
        _multi_use: bool,
    ) -> PortResult<String> {
        self.check(IssuerCall::MintBundleId)?;
        let bundle_id = new_id();
        self.minted.write().insert(bundle_id.clone(), bundle.clone());
        Ok(bundle_id)
    }

    async fn create_line(
        &self,
        kind: PortKind,
        port_id: &PortId,
        intro: &IntroMessage,
    ) -> PortResult<LineGrant> {
        self.check(IssuerCall::CreateLine)?;
        let grant = self.next_grant();
        self.line_requests.write().push(LineRequest {
            kind,
            port_id: port_id.clone(),
            ticket: None,
            intro: intro.clone(),
            grant: grant.clone(),
        });
        Ok(grant)
    }

    async fn create_line_from_contact_port(
        &self,
        port_id: &PortId,
        ticket: &TicketId,
        intro: &IntroMessage,
    ) -> PortResult<LineGrant> {
        self.check(IssuerCall::CreateLine)?;
        self.ensure_live(&RemotePort::ContactPort(port_id.clone()))?;
        let grant = self.next_grant();
        self.line_requests.write().push(LineRequest {
            kind: PortKind::ContactPort,
            port_id: port_id.clone(),
            ticket: Some(ticket.clone()),
            intro: intro.clone(),
            grant: grant.clone(),
        });
        Ok(grant)
    }

    async fn join_group(&self, _kind: PortKind, port_id: &PortId) -> PortResult<GroupGrant> {
        self.check(IssuerCall::JoinGroup)?;
        Ok(GroupGrant {
            group_id: format!("group-{}", port_id),
            member_id: new_id(),
        })
    }

    async fn create_contact_port_ticket(
        &self,
        port_id: &PortId,
        ticket: &TicketId,
        line_id: &LineId,
        _encrypted_payload: &str,
    ) -> PortResult<()> {
        self.check(IssuerCall::CreateTicket)?;
        self.tickets
            .write()
            .push((port_id.clone(), ticket.clone(), line_id.clone()));
        Ok(())
    }

    async fn report_line_failure(&self, line_id: &LineId) -> PortResult<()> {
        self.check(IssuerCall::ReportFailure)?;
        self.reported.write().push(line_id.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_failure_injection() {
        let issuer = InMemoryIssuer::default();
        issuer.fail(
            IssuerCall::FetchPorts,
            PortError::TransientIssuer("offline".into()),
        );
        assert!(issuer.fetch_unused_ports().await.unwrap_err().is_transient());
        issuer.recover(IssuerCall::FetchPorts);
        assert_eq!(issuer.fetch_unused_ports().await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_deleted_port_is_gone() {
        let issuer = InMemoryIssuer::default();
        let port = RemotePort::Superport(issuer.new_superport(3).await.unwrap());
        issuer.delete_port(&port).await.unwrap();
        assert!(issuer
            .set_paused(&port, true)
            .await
            .unwrap_err()
            .is_permanent());
        assert!(issuer.delete_port(&port).await.unwrap_err().is_permanent());
    }

    #[tokio::test]
    async fn test_queued_grant_is_used() {
        let issuer = InMemoryIssuer::default();
        issuer.queue_line_grant("L1", "P1");
        let intro = IntroMessage {
            pubkey: "k".into(),
            encrypted_secret_content: "c".into(),
        };
        let grant = issuer
            .create_line(PortKind::Direct, &"p".to_string(), &intro)
            .await
            .unwrap();
        assert_eq!(grant.line_id, "L1");
        assert_eq!(issuer.line_requests()[0].intro, intro);
    }
}
