//! Change notifications for consumers sharing one project's schema.

use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;

const DEFAULT_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SchemaEvent {
    TablesImported { project_id: String, tables: Vec<String> },
    TablesOverwritten { project_id: String, tables: Vec<String> },
    IndexAdded { project_id: String, index: String },
    IndexRemoved { project_id: String, index: String },
    /// Non-table entities merged by an import, by name.
    ObjectsImported {
        project_id: String,
        indexes: Vec<String>,
        functions: Vec<String>,
        triggers: Vec<String>,
        policies: Vec<String>,
        enum_types: Vec<String>,
    },
}

impl SchemaEvent {
    pub fn project_id(&self) -> &str {
        match self {
            Self::TablesImported { project_id, .. }
            | Self::TablesOverwritten { project_id, .. }
            | Self::IndexAdded { project_id, .. }
            | Self::IndexRemoved { project_id, .. }
            | Self::ObjectsImported { project_id, .. } => project_id,
        }
    }
}

/// Publish/subscribe channels keyed by project id.
///
/// Cheap to clone; clones share the same channels. Pass one to every
/// component that mutates or watches a project.
#[derive(Debug, Clone)]
pub struct SchemaEventBus {
    channels: Arc<RwLock<HashMap<String, broadcast::Sender<SchemaEvent>>>>,
    capacity: usize,
}

impl Default for SchemaEventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl SchemaEventBus {
    /// `capacity` is the per-project backlog a slow receiver may fall behind
    /// by before it starts missing events.
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: Arc::new(RwLock::new(HashMap::new())),
            capacity: capacity.max(1),
        }
    }

    pub fn subscribe(&self, project_id: &str) -> broadcast::Receiver<SchemaEvent> {
        let mut channels = self.channels.write();
        channels
            .entry(project_id.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Send to the event's project. Returns how many receivers got it.
    pub fn publish(&self, event: SchemaEvent) -> usize {
        let channels = self.channels.read();
        let Some(sender) = channels.get(event.project_id()) else {
            tracing::trace!(project_id = %event.project_id(), "no subscribers for event");
            return 0;
        };
        sender.send(event).unwrap_or(0)
    }

    pub fn subscriber_count(&self, project_id: &str) -> usize {
        self.channels
            .read()
            .get(project_id)
            .map_or(0, |s| s.receiver_count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn added(project_id: &str, index: &str) -> SchemaEvent {
        SchemaEvent::IndexAdded {
            project_id: project_id.into(),
            index: index.into(),
        }
    }

    #[test]
    fn test_events_reach_every_subscriber_of_the_project() {
        let bus = SchemaEventBus::default();
        let mut first = bus.subscribe("p1");
        let mut second = bus.clone().subscribe("p1");
        let mut other = bus.subscribe("p2");

        assert_eq!(bus.publish(added("p1", "users_email_idx")), 2);

        assert_eq!(first.try_recv().unwrap(), added("p1", "users_email_idx"));
        assert_eq!(second.try_recv().unwrap(), added("p1", "users_email_idx"));
        assert!(other.try_recv().is_err());
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = SchemaEventBus::default();
        assert_eq!(bus.publish(added("p1", "idx")), 0);

        let receiver = bus.subscribe("p1");
        drop(receiver);
        assert_eq!(bus.subscriber_count("p1"), 0);
        assert_eq!(bus.publish(added("p1", "idx")), 0);
    }
}
