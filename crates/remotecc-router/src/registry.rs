//! Client registry
//!
//! Tracks every open connection and, per origin, the one connection allowed
//! to drive the output. The registry is plain data: it is only ever touched
//! from inside the [`Arbiter`](crate::Arbiter) lock and never performs I/O
//! on a connection. Evictions are returned to the caller.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;

use crate::connection::{Connection, ConnectionId};

/// Result of removing a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Unregistered {
    /// The connection was the active controller for its origin
    pub was_active: bool,
}

/// Point-in-time registry view
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RegistrySnapshot {
    pub connected_count: usize,
    /// Active controllers as `ip:port`, sorted
    pub active_list: Vec<String>,
}

#[derive(Default)]
pub struct ClientRegistry {
    connections: HashMap<ConnectionId, Arc<Connection>>,
    active: HashMap<IpAddr, Arc<Connection>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an open connection. Does not elect it.
    pub fn register(&mut self, connection: Arc<Connection>) {
        self.connections.insert(connection.id, connection);
    }

    /// Remove a connection, clearing its origin's active entry if it held it
    pub fn unregister(&mut self, connection: &Connection) -> Unregistered {
        self.connections.remove(&connection.id);

        let was_active = self.is_active(connection);
        if was_active {
            self.active.remove(&connection.origin());
        }

        Unregistered { was_active }
    }

    pub fn contains(&self, connection: &Connection) -> bool {
        self.connections.contains_key(&connection.id)
    }

    /// Whether `connection` is the active controller for its origin
    pub fn is_active(&self, connection: &Connection) -> bool {
        self.active
            .get(&connection.origin())
            .map(|active| active.id == connection.id)
            .unwrap_or(false)
    }

    /// Make `connection` the active controller for its origin.
    ///
    /// Returns the previous holder when it was a different connection.
    pub fn elect(&mut self, connection: Arc<Connection>) -> Option<Arc<Connection>> {
        let origin = connection.origin();
        let previous = self.active.insert(origin, connection.clone())?;
        if previous.id == connection.id {
            None
        } else {
            Some(previous)
        }
    }

    pub fn active_for(&self, origin: IpAddr) -> Option<&Arc<Connection>> {
        self.active.get(&origin)
    }

    pub fn connected_count(&self) -> usize {
        self.connections.len()
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn snapshot(&self) -> RegistrySnapshot {
        let mut active_list: Vec<String> = self.active.values().map(|c| c.label()).collect();
        active_list.sort();

        RegistrySnapshot {
            connected_count: self.connections.len(),
            active_list,
        }
    }
}
