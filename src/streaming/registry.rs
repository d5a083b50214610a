// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/heliowatch

//! Connected viewers

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::DeliveryError;

/// Unique id of one viewer connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Something that can receive serialized updates
#[async_trait]
pub trait Viewer: Send + Sync {
    fn id(&self) -> ConnectionId;

    /// Deliver one text message. Must complete in bounded time.
    async fn send(&self, text: &str) -> Result<(), DeliveryError>;

    /// Called once the viewer has been dropped from the registry
    async fn close(&self) {}
}

/// Set of live viewers.
///
/// `snapshot` hands out a copy, so fan-out can iterate while connections
/// come and go, and `remove` is idempotent because both the receive task
/// and a failed send may drop the same viewer.
#[derive(Default)]
pub struct ConnectionRegistry {
    viewers: RwLock<HashMap<ConnectionId, Arc<dyn Viewer>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a viewer, returns the new count
    pub fn add(&self, viewer: Arc<dyn Viewer>) -> usize {
        let mut viewers = self.viewers.write();
        viewers.insert(viewer.id(), viewer);
        viewers.len()
    }

    /// Returns whether the viewer was still registered
    pub fn remove(&self, id: ConnectionId) -> bool {
        self.viewers.write().remove(&id).is_some()
    }

    /// Drop a viewer that failed a send and tell it to shut down.
    /// Returns whether it was still registered.
    pub async fn evict(&self, viewer: &Arc<dyn Viewer>) -> bool {
        let removed = self.remove(viewer.id());
        if removed {
            viewer.close().await;
        }
        removed
    }

    pub fn snapshot(&self) -> Vec<Arc<dyn Viewer>> {
        self.viewers.read().values().cloned().collect()
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.viewers.read().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.viewers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.viewers.read().is_empty()
    }
}

/// In-process viewer backed by an unbounded channel
pub struct ChannelViewer {
    id: ConnectionId,
    tx: mpsc::UnboundedSender<String>,
}

impl ChannelViewer {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                id: ConnectionId::new(),
                tx,
            },
            rx,
        )
    }
}

#[async_trait]
impl Viewer for ChannelViewer {
    fn id(&self) -> ConnectionId {
        self.id
    }

    async fn send(&self, text: &str) -> Result<(), DeliveryError> {
        self.tx
            .send(text.to_string())
            .map_err(|_| DeliveryError::Closed(self.id.to_string()))
    }
}
