use std::fmt;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use uuid::Uuid;

use sentra_core::events::ServerEvent;

/// Who is on the other end of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Identity {
    Customer(Uuid),
    Operator(Uuid),
}

impl Identity {
    pub fn customer_id(self) -> Option<Uuid> {
        match self {
            Identity::Customer(id) => Some(id),
            Identity::Operator(_) => None,
        }
    }

    pub fn is_operator(self) -> bool {
        matches!(self, Identity::Operator(_))
    }
}

/// One live real-time connection. Events flow out through a bounded
/// channel drained by the socket writer task.
#[derive(Clone)]
pub struct ClientConnection {
    pub id: Uuid,
    pub identity: Identity,
    pub connected_at: DateTime<Utc>,
    sender: mpsc::Sender<ServerEvent>,
}

impl fmt::Debug for ClientConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConnection")
            .field("id", &self.id)
            .field("identity", &self.identity)
            .field("connected_at", &self.connected_at)
            .field("channel_closed", &self.sender.is_closed())
            .finish()
    }
}

impl ClientConnection {
    pub fn new(identity: Identity, sender: mpsc::Sender<ServerEvent>) -> Self {
        Self {
            id: Uuid::new_v4(),
            identity,
            connected_at: Utc::now(),
            sender,
        }
    }

    /// Fire-and-forget delivery. A closed or saturated channel loses
    /// the event; returns whether it was accepted.
    pub fn deliver(&self, event: ServerEvent) -> bool {
        self.sender.try_send(event).is_ok()
    }
}
