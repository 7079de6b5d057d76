//! In-process event fan-out
//!
//! Per user a list of subscriber sessions; lifecycle events are published
//! to every session of the target user. Delivery is best-effort: a session
//! whose send fails (receiver dropped) is removed. Ordering within one
//! session follows from the underlying channel being FIFO.
//!
//! The registry lock is held only to snapshot or mutate the session list;
//! sends happen on unbounded channels and never block the publisher.

use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use crate::models::event::TxEvent;

struct Session {
    id: Uuid,
    sender: mpsc::UnboundedSender<TxEvent>,
}

/// A subscriber session handle. Dropping it (or the receiver) detaches the
/// session on the next publish.
pub struct Subscription {
    user_id: String,
    session_id: Uuid,
    receiver: mpsc::UnboundedReceiver<TxEvent>,
}

impl Subscription {
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Next event, in publish order. `None` once unsubscribed.
    pub async fn recv(&mut self) -> Option<TxEvent> {
        self.receiver.recv().await
    }

    /// Non-blocking variant for drains in synchronous contexts.
    pub fn try_recv(&mut self) -> Option<TxEvent> {
        self.receiver.try_recv().ok()
    }
}

/// Fan-out registry of per-user subscriber sessions.
#[derive(Default)]
pub struct EventBus {
    sessions: Mutex<HashMap<String, Vec<Session>>>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus").finish_non_exhaustive()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new session for a user.
    pub fn subscribe(&self, user_id: &str) -> Subscription {
        let (sender, receiver) = mpsc::unbounded_channel();
        let session_id = Uuid::new_v4();

        let mut sessions = self.sessions.lock().expect("bus lock poisoned");
        sessions
            .entry(user_id.to_string())
            .or_default()
            .push(Session {
                id: session_id,
                sender,
            });
        debug!(user_id, %session_id, "subscriber attached");

        Subscription {
            user_id: user_id.to_string(),
            session_id,
            receiver,
        }
    }

    /// Remove one session. A no-op if it is already gone.
    pub fn unsubscribe(&self, user_id: &str, session_id: Uuid) {
        let mut sessions = self.sessions.lock().expect("bus lock poisoned");
        if let Some(list) = sessions.get_mut(user_id) {
            list.retain(|s| s.id != session_id);
            if list.is_empty() {
                sessions.remove(user_id);
            }
        }
    }

    /// Publish an event to every session of a user. Returns the number of
    /// sessions that received it; dead sessions are dropped.
    pub fn publish(&self, user_id: &str, event: TxEvent) -> usize {
        // Snapshot the senders under the lock, send outside it
        let targets: Vec<(Uuid, mpsc::UnboundedSender<TxEvent>)> = {
            let sessions = self.sessions.lock().expect("bus lock poisoned");
            match sessions.get(user_id) {
                Some(list) => list.iter().map(|s| (s.id, s.sender.clone())).collect(),
                None => return 0,
            }
        };

        let mut delivered = 0;
        let mut dead = Vec::new();
        for (id, sender) in targets {
            if sender.send(event.clone()).is_ok() {
                delivered += 1;
            } else {
                dead.push(id);
            }
        }

        if !dead.is_empty() {
            let mut sessions = self.sessions.lock().expect("bus lock poisoned");
            if let Some(list) = sessions.get_mut(user_id) {
                list.retain(|s| !dead.contains(&s.id));
                if list.is_empty() {
                    sessions.remove(user_id);
                }
            }
            debug!(user_id, dropped = dead.len(), "dropped dead subscriber sessions");
        }

        delivered
    }

    /// Total live sessions across users.
    pub fn session_count(&self) -> usize {
        self.sessions
            .lock()
            .expect("bus lock poisoned")
            .values()
            .map(Vec::len)
            .sum()
    }

    /// Whether a user has at least one session.
    pub fn is_subscribed(&self, user_id: &str) -> bool {
        self.sessions
            .lock()
            .expect("bus lock poisoned")
            .get(user_id)
            .is_some_and(|l| !l.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(tx_id: &str) -> TxEvent {
        TxEvent::TransactionConfirmed {
            tx_id: tx_id.to_string(),
            amount: 100.0,
        }
    }

    #[test]
    fn test_publish_reaches_every_session_of_the_user() {
        let bus = EventBus::new();
        let mut a = bus.subscribe("u1");
        let mut b = bus.subscribe("u1");
        let mut other = bus.subscribe("u2");

        assert_eq!(bus.publish("u1", event("t1")), 2);
        assert!(a.try_recv().is_some());
        assert!(b.try_recv().is_some());
        assert!(other.try_recv().is_none());
    }

    #[test]
    fn test_publish_to_unknown_user_is_silent() {
        let bus = EventBus::new();
        assert_eq!(bus.publish("ghost", event("t1")), 0);
    }

    #[test]
    fn test_dead_sessions_are_dropped_on_publish() {
        let bus = EventBus::new();
        let sub = bus.subscribe("u1");
        drop(sub);
        assert_eq!(bus.session_count(), 1);
        assert_eq!(bus.publish("u1", event("t1")), 0);
        assert_eq!(bus.session_count(), 0);
    }

    #[test]
    fn test_unsubscribe_removes_only_that_session() {
        let bus = EventBus::new();
        let a = bus.subscribe("u1");
        let mut b = bus.subscribe("u1");
        bus.unsubscribe("u1", a.session_id());
        assert_eq!(bus.publish("u1", event("t1")), 1);
        assert!(b.try_recv().is_some());
    }

    #[test]
    fn test_per_session_ordering_is_preserved() {
        let bus = EventBus::new();
        let mut sub = bus.subscribe("u1");
        for i in 0..5 {
            bus.publish("u1", event(&format!("t{i}")));
        }
        for i in 0..5 {
            let got = sub.try_recv().unwrap();
            assert_eq!(got.tx_id(), format!("t{i}"));
        }
    }
}
