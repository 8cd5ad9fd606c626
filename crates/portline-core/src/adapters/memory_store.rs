//! # In-Memory Port Store
//!
//! Reference `PortLifecycleStore` backed by `parking_lot` maps.

use crate::domain::{
    CorrelationKey, GeneratedPort, PoolKey, PortId, PortResult, ReadPortRecord, Ticket, TicketId,
};
use crate::ports::PortLifecycleStore;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{HashMap, VecDeque};

/// In-memory lifecycle store.
#[derive(Default)]
pub struct InMemoryPortStore {
    generated: RwLock<HashMap<PortId, GeneratedPort>>,
    read: RwLock<HashMap<PortId, ReadPortRecord>>,
    pools: RwLock<HashMap<PoolKey, VecDeque<PortId>>>,
    tickets: RwLock<HashMap<(PortId, TicketId), Ticket>>,
}

impl InMemoryPortStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of generated records.
    pub fn generated_count(&self) -> usize {
        self.generated.read().len()
    }

    /// Number of read records.
    pub fn read_count(&self) -> usize {
        self.read.read().len()
    }
}

#[async_trait]
impl PortLifecycleStore for InMemoryPortStore {
    async fn save_generated(&self, port: GeneratedPort) -> PortResult<()> {
        self.generated
            .write()
            .insert(port.port_id().to_string(), port);
        Ok(())
    }

    async fn get_generated(&self, port_id: &PortId) -> PortResult<Option<GeneratedPort>> {
        Ok(self.generated.read().get(port_id).cloned())
    }

    async fn find_generated(&self, key: &CorrelationKey) -> PortResult<Option<GeneratedPort>> {
        Ok(self
            .generated
            .read()
            .values()
            .find(|port| port.correlation_key().as_ref() == Some(key))
            .cloned())
    }

    async fn list_generated(&self) -> PortResult<Vec<GeneratedPort>> {
        Ok(self.generated.read().values().cloned().collect())
    }

    async fn delete_generated(&self, port_id: &PortId) -> PortResult<()> {
        self.generated.write().remove(port_id);
        Ok(())
    }

    async fn save_read(&self, record: ReadPortRecord) -> PortResult<()> {
        self.read.write().insert(record.port_id.clone(), record);
        Ok(())
    }

    async fn get_read(&self, port_id: &PortId) -> PortResult<Option<ReadPortRecord>> {
        Ok(self.read.read().get(port_id).cloned())
    }

    async fn list_read(&self) -> PortResult<Vec<ReadPortRecord>> {
        let mut records: Vec<_> = self.read.read().values().cloned().collect();
        records.sort_by_key(|r| r.created_on);
        Ok(records)
    }

    async fn delete_read(&self, port_id: &PortId) -> PortResult<()> {
        self.read.write().remove(port_id);
        Ok(())
    }

    async fn push_unused_ports(&self, pool: &PoolKey, port_ids: Vec<PortId>) -> PortResult<()> {
        self.pools
            .write()
            .entry(pool.clone())
            .or_default()
            .extend(port_ids);
        Ok(())
    }

    async fn pop_unused_port(&self, pool: &PoolKey) -> PortResult<Option<PortId>> {
        Ok(self
            .pools
            .write()
            .get_mut(pool)
            .and_then(VecDeque::pop_front))
    }

    async fn count_unused_ports(&self, pool: &PoolKey) -> PortResult<usize> {
        Ok(self.pools.read().get(pool).map_or(0, VecDeque::len))
    }

    async fn save_ticket(&self, ticket: Ticket) -> PortResult<()> {
        self.tickets.write().insert(
            (ticket.contact_port_id.clone(), ticket.ticket_id.clone()),
            ticket,
        );
        Ok(())
    }

    async fn get_ticket(
        &self,
        contact_port_id: &PortId,
        ticket_id: &TicketId,
    ) -> PortResult<Option<Ticket>> {
        Ok(self
            .tickets
            .read()
            .get(&(contact_port_id.clone(), ticket_id.clone()))
            .cloned())
    }

    async fn delete_tickets(&self, contact_port_id: &PortId) -> PortResult<()> {
        self.tickets
            .write()
            .retain(|(port_id, _), _| port_id != contact_port_id);
        Ok(())
    }
}
