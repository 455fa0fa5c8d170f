// Room Registry
//
// Who is watching which match. Each room tracks its sessions, the sessions
// of each user, and the distinct users derived from those. A user stays in
// the room while at least one of their sessions does.

use crate::store::{PresenceStore, Result};
use std::sync::Arc;

pub fn users_key(match_id: &str) -> String {
    format!("match:{}:users", match_id)
}

pub fn sessions_key(match_id: &str) -> String {
    format!("match:{}:sessions", match_id)
}

pub fn user_sessions_key(match_id: &str, user_id: &str) -> String {
    format!("match:{}:user:{}:sessions", match_id, user_id)
}

#[derive(Clone)]
pub struct RoomRegistry {
    store: Arc<dyn PresenceStore>,
}

impl RoomRegistry {
    pub fn new(store: Arc<dyn PresenceStore>) -> Self {
        Self { store }
    }

    /// Record `session_id` of `user_id` in the room and return the distinct user count.
    pub async fn join(&self, match_id: &str, user_id: &str, session_id: &str) -> Result<usize> {
        self.store
            .set_add(&user_sessions_key(match_id, user_id), session_id)
            .await?;
        self.store.set_add(&sessions_key(match_id), session_id).await?;
        self.store.set_add(&users_key(match_id), user_id).await?;
        self.active_user_count(match_id).await
    }

    /// Drop `session_id` from the room and return the distinct user count.
    /// Leaving a room the session never joined changes nothing.
    pub async fn leave(&self, match_id: &str, user_id: &str, session_id: &str) -> Result<usize> {
        self.store.set_remove(&sessions_key(match_id), session_id).await?;
        // The user goes only with their last session, checked in the same store step
        let gone = self
            .store
            .set_remove_cascade(
                &user_sessions_key(match_id, user_id),
                session_id,
                &users_key(match_id),
                user_id,
            )
            .await?;
        if gone {
            tracing::debug!("User {} has no sessions left in match {}", user_id, match_id);
        }
        self.active_user_count(match_id).await
    }

    pub async fn active_user_count(&self, match_id: &str) -> Result<usize> {
        self.store.set_card(&users_key(match_id)).await
    }

    pub async fn active_users(&self, match_id: &str) -> Result<Vec<String>> {
        self.store.set_members(&users_key(match_id)).await
    }

    pub async fn session_count(&self, match_id: &str) -> Result<usize> {
        self.store.set_card(&sessions_key(match_id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryPresenceStore;

    fn registry() -> RoomRegistry {
        RoomRegistry::new(Arc::new(MemoryPresenceStore::new()))
    }

    #[tokio::test]
    async fn test_same_user_two_sessions_counts_once() {
        let rooms = registry();
        assert_eq!(rooms.join("m1", "alice", "s1").await.unwrap(), 1);
        assert_eq!(rooms.join("m1", "alice", "s2").await.unwrap(), 1);
        assert_eq!(rooms.session_count("m1").await.unwrap(), 2);

        // Alice is still present through her second session
        assert_eq!(rooms.leave("m1", "alice", "s1").await.unwrap(), 1);
        assert_eq!(rooms.active_users("m1").await.unwrap(), vec!["alice"]);
        assert_eq!(rooms.leave("m1", "alice", "s2").await.unwrap(), 0);
        assert_eq!(rooms.session_count("m1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_leave_is_idempotent() {
        let rooms = registry();
        rooms.join("m1", "bob", "s1").await.unwrap();
        assert_eq!(rooms.leave("m1", "carol", "s9").await.unwrap(), 1);
        assert_eq!(rooms.leave("m1", "bob", "s1").await.unwrap(), 0);
        assert_eq!(rooms.leave("m1", "bob", "s1").await.unwrap(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_join_leave_keeps_users_consistent() {
        let rooms = registry();
        rooms.join("m1", "alice", "anchor").await.unwrap();

        let mut tasks = Vec::new();
        for i in 0..64 {
            let rooms = rooms.clone();
            let user = if i % 2 == 0 { "alice" } else { "bob" };
            tasks.push(tokio::spawn(async move {
                let session = format!("s{}", i);
                rooms.join("m1", user, &session).await.unwrap();
                tokio::task::yield_now().await;
                rooms.leave("m1", user, &session).await.unwrap();
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        // Alice keeps her anchor session throughout; every bob session left
        assert_eq!(rooms.active_users("m1").await.unwrap(), vec!["alice"]);
        assert_eq!(rooms.session_count("m1").await.unwrap(), 1);
        assert_eq!(rooms.leave("m1", "alice", "anchor").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_rooms_are_partitioned_by_match() {
        let rooms = registry();
        rooms.join("m1", "alice", "s1").await.unwrap();
        rooms.join("m2", "bob", "s2").await.unwrap();
        rooms.join("m2", "carol", "s3").await.unwrap();
        assert_eq!(rooms.active_user_count("m1").await.unwrap(), 1);
        assert_eq!(rooms.active_user_count("m2").await.unwrap(), 2);
    }
}
