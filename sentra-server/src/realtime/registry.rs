use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, info};
use uuid::Uuid;

use sentra_core::events::{EventSink, ServerEvent};

use super::connection::{ClientConnection, Identity};

/// Group every operator console joins on connect.
pub const OPERATORS_GROUP: &str = "operators";

/// Group a customer's own connections join on connect.
pub fn customer_group(customer_id: Uuid) -> String {
    format!("customer:{customer_id}")
}

/// Tracks live connections and their group memberships.
///
/// A customer has at most one live connection: registering a new one
/// displaces the previous entry in the customer table, so fan-out
/// reaches only the latest socket. All maps are sharded; no global
/// lock is held during delivery.
#[derive(Debug, Default)]
pub struct PresenceRegistry {
    connections: DashMap<Uuid, Arc<ClientConnection>>,
    groups: DashMap<String, Vec<Uuid>>,
    /// customer_id -> connection_id of the customer's live socket.
    customers: DashMap<Uuid, Uuid>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, connection: Arc<ClientConnection>) {
        let conn_id = connection.id;
        match connection.identity {
            Identity::Customer(customer_id) => {
                if let Some(previous) = self.customers.insert(customer_id, conn_id) {
                    debug!(%customer_id, displaced = %previous, "customer reconnected, displacing prior socket");
                }
                self.join_group(&customer_group(customer_id), conn_id);
            }
            Identity::Operator(operator_id) => {
                debug!(%operator_id, "operator console connected");
                self.join_group(OPERATORS_GROUP, conn_id);
            }
        }

        self.connections.insert(conn_id, connection);
        info!(connection_id = %conn_id, total = self.connections.len(), "connection registered");
    }

    pub fn unregister(&self, connection_id: Uuid) -> Option<Arc<ClientConnection>> {
        let (_, connection) = self.connections.remove(&connection_id)?;

        match connection.identity {
            Identity::Customer(customer_id) => {
                // Only clear the liveness entry if it still points at
                // this socket; a reconnect may have displaced it.
                self.customers
                    .remove_if(&customer_id, |_, live| *live == connection_id);
                self.leave_group(&customer_group(customer_id), connection_id);
            }
            Identity::Operator(_) => {
                self.leave_group(OPERATORS_GROUP, connection_id);
            }
        }

        info!(connection_id = %connection_id, total = self.connections.len(), "connection unregistered");
        Some(connection)
    }

    pub fn get(&self, connection_id: Uuid) -> Option<Arc<ClientConnection>> {
        self.connections
            .get(&connection_id)
            .map(|entry| Arc::clone(entry.value()))
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// The customer's live socket, if they are connected.
    pub fn customer_connection(&self, customer_id: Uuid) -> Option<Arc<ClientConnection>> {
        let conn_id = *self.customers.get(&customer_id)?;
        self.get(conn_id)
    }

    pub fn broadcast_to_group(&self, group: &str, event: ServerEvent) {
        let members = match self.groups.get(group) {
            Some(entry) => entry.value().clone(),
            None => return,
        };

        for conn_id in members {
            if let Some(connection) = self.get(conn_id)
                && !connection.deliver(event.clone())
            {
                debug!(connection_id = %conn_id, event = event.name(), "delivery dropped");
            }
        }
    }

    fn join_group(&self, group: &str, connection_id: Uuid) {
        self.groups
            .entry(group.to_string())
            .or_default()
            .push(connection_id);
    }

    fn leave_group(&self, group: &str, connection_id: Uuid) {
        if let Some(mut members) = self.groups.get_mut(group) {
            members.retain(|id| *id != connection_id);
            if members.is_empty() {
                drop(members);
                self.groups.remove_if(group, |_, m| m.is_empty());
            }
        }
    }
}

impl EventSink for PresenceRegistry {
    fn notify_customer(&self, customer_id: Uuid, event: ServerEvent) {
        self.broadcast_to_group(&customer_group(customer_id), event);
    }

    fn notify_operators(&self, event: ServerEvent) {
        self.broadcast_to_group(OPERATORS_GROUP, event);
    }
}
