//! In-process change notifier.

use tokio::sync::broadcast;
use tracing::{debug, trace};

use dms_core::config::notification::NotificationConfig;
use dms_core::events::{ChangeEvent, ChangeKind};
use dms_core::types::{NodeRef, OperationId, UserId};

use crate::recompute::ChangeSet;

/// Broadcasts a [`ChangeEvent`] for every applied mutation.
///
/// Delivery is fire-and-forget. Having no subscribers, or a subscriber
/// that lags behind the channel capacity, never affects the mutation.
#[derive(Debug, Clone)]
pub struct ChangeNotifier {
    sender: broadcast::Sender<ChangeEvent>,
}

impl ChangeNotifier {
    /// Create a notifier buffering up to `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn from_config(config: &NotificationConfig) -> Self {
        Self::new(config.channel_capacity)
    }

    /// Subscribe to all future events.
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.sender.subscribe()
    }

    /// Send one event.
    pub fn notify(&self, event: ChangeEvent) {
        trace!(node = %event.node, change = ?event.change, "Change event");
        if self.sender.send(event).is_err() {
            debug!("Change event dropped: no subscribers");
        }
    }

    /// Send the event for the mutated node, then a `Recomputed` event for
    /// every other node whose derived fields changed as a consequence.
    pub fn publish(
        &self,
        primary: NodeRef,
        change: ChangeKind,
        fields: &[&str],
        mut derived: ChangeSet,
        actor: Option<UserId>,
        operation_id: Option<OperationId>,
    ) {
        let own = derived.remove(primary).unwrap_or_default();
        let changed = fields
            .iter()
            .map(|f| f.to_string())
            .chain(own.iter().map(|f| f.as_str().to_string()));
        self.notify(ChangeEvent::new(primary, change, changed, actor, operation_id));
        self.publish_recomputed(derived, actor, operation_id);
    }

    /// Send a `Created` event per new node, then `Recomputed` events for
    /// the existing nodes whose totals changed.
    pub fn publish_created(
        &self,
        created: &[NodeRef],
        mut derived: ChangeSet,
        actor: Option<UserId>,
        operation_id: Option<OperationId>,
    ) {
        for node in created {
            let own = derived.remove(*node).unwrap_or_default();
            let changed = std::iter::once("name").chain(own.iter().map(|f| f.as_str()));
            self.notify(ChangeEvent::new(*node, ChangeKind::Created, changed, actor, operation_id));
        }
        self.publish_recomputed(derived, actor, operation_id);
    }

    /// Send a `Deleted` event per removed node.
    pub fn publish_deleted(&self, removed: &[NodeRef], actor: Option<UserId>, operation_id: Option<OperationId>) {
        for node in removed {
            self.notify(ChangeEvent::new(
                *node,
                ChangeKind::Deleted,
                Vec::<String>::new(),
                actor,
                operation_id,
            ));
        }
    }

    /// Send a `Recomputed` event per node in a change set.
    pub fn publish_recomputed(&self, derived: ChangeSet, actor: Option<UserId>, operation_id: Option<OperationId>) {
        for (node, changed) in derived {
            self.notify(ChangeEvent::new(
                node,
                ChangeKind::Recomputed,
                changed.iter().map(|f| f.as_str()),
                actor,
                operation_id,
            ));
        }
    }
}
