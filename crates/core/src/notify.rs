// Match Notifications
//
// Typed domain events published by the lifecycle driver after the state they
// describe has been persisted. Consumers subscribe; nobody shares an emitter.

use crate::model::{Match, MatchEvent};
use tokio::sync::broadcast;

const DEFAULT_CAPACITY: usize = 1024;

#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    /// Full match snapshot after a persisted tick
    MatchUpdated(Match),
    /// A newly recorded event, carrying its match id
    MatchEvent(MatchEvent),
}

impl Notification {
    pub fn match_id(&self) -> &str {
        match self {
            Notification::MatchUpdated(m) => &m.id,
            Notification::MatchEvent(e) => &e.match_id,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NotificationBus {
    tx: broadcast::Sender<Notification>,
}

impl NotificationBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish to every current subscriber. Returns how many received it.
    pub fn publish(&self, notification: Notification) -> usize {
        // No subscriber is not an error: the simulation runs with or without viewers
        self.tx.send(notification).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.tx.subscribe()
    }
}

impl Default for NotificationBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Team;

    #[tokio::test]
    async fn test_publish_without_subscribers() {
        let bus = NotificationBus::new();
        let m = Match::new(Team::new("A", "AAA"), Team::new("B", "BBB"));
        assert_eq!(bus.publish(Notification::MatchUpdated(m)), 0);
    }

    #[tokio::test]
    async fn test_subscribers_receive_in_order() {
        let bus = NotificationBus::new();
        let mut rx = bus.subscribe();
        let m = Match::new(Team::new("A", "AAA"), Team::new("B", "BBB"));
        bus.publish(Notification::MatchUpdated(m.clone().with_minute(1)));
        bus.publish(Notification::MatchUpdated(m.clone().with_minute(2)));

        match rx.recv().await.unwrap() {
            Notification::MatchUpdated(first) => assert_eq!(first.minute, 1),
            other => panic!("unexpected {:?}", other),
        }
        let second = rx.recv().await.unwrap();
        assert_eq!(second.match_id(), m.id);
    }
}
