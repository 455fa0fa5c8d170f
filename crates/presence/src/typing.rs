// Typing Tracker
//
// A typing flag is an expiring key per (match, user). Flags lapse on their
// own; enumeration walks the key space in cursor batches.

use crate::store::{PresenceStore, Result, ScanCursor};
use matchcast_core::config::PresenceConfig;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

fn typing_prefix(match_id: &str) -> String {
    format!("match:{}:typing:", match_id)
}

pub fn typing_key(match_id: &str, user_id: &str) -> String {
    format!("{}{}", typing_prefix(match_id), user_id)
}

#[derive(Clone)]
pub struct TypingTracker {
    store: Arc<dyn PresenceStore>,
    ttl: Duration,
    scan_batch: usize,
}

impl TypingTracker {
    pub fn new(store: Arc<dyn PresenceStore>, config: &PresenceConfig) -> Self {
        Self {
            store,
            ttl: config.typing_ttl(),
            scan_batch: config.scan_batch_size,
        }
    }

    /// Raise (or refresh) the flag when `is_typing`, clear it otherwise.
    pub async fn set_typing(&self, match_id: &str, user_id: &str, is_typing: bool) -> Result<()> {
        let key = typing_key(match_id, user_id);
        if is_typing {
            self.store.set_ex(&key, "1", self.ttl).await
        } else {
            self.store.del(&key).await.map(|_| ())
        }
    }

    /// Users with a live typing flag in the room, sorted
    pub async fn typing_users(&self, match_id: &str) -> Result<Vec<String>> {
        let prefix = typing_prefix(match_id);
        let mut users = BTreeSet::new();
        let mut cursor = ScanCursor::start();
        loop {
            let page = self.store.scan(&cursor, &prefix, self.scan_batch).await?;
            users.extend(
                page.keys
                    .iter()
                    .filter_map(|key| key.strip_prefix(&prefix))
                    .map(str::to_string),
            );
            cursor = page.cursor;
            if cursor.is_start() {
                break;
            }
        }
        Ok(users.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryPresenceStore;

    fn tracker(batch: usize) -> TypingTracker {
        let config = PresenceConfig {
            scan_batch_size: batch,
            ..PresenceConfig::default()
        };
        TypingTracker::new(Arc::new(MemoryPresenceStore::new()), &config)
    }

    #[tokio::test(start_paused = true)]
    async fn test_flag_lapses_after_ttl() {
        let typing = tracker(100);
        typing.set_typing("m1", "alice", true).await.unwrap();
        assert_eq!(typing.typing_users("m1").await.unwrap(), vec!["alice"]);

        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(typing.typing_users("m1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_clear_flag() {
        let typing = tracker(100);
        typing.set_typing("m1", "alice", true).await.unwrap();
        typing.set_typing("m1", "bob", true).await.unwrap();
        typing.set_typing("m1", "alice", false).await.unwrap();
        typing.set_typing("m1", "nobody", false).await.unwrap();
        assert_eq!(typing.typing_users("m1").await.unwrap(), vec!["bob"]);
    }

    #[tokio::test]
    async fn test_enumeration_spans_batches_and_rooms() {
        let typing = tracker(3);
        for user in ["e", "d", "c", "b", "a"] {
            typing.set_typing("1", user, true).await.unwrap();
        }
        typing.set_typing("10", "z", true).await.unwrap();

        assert_eq!(
            typing.typing_users("1").await.unwrap(),
            vec!["a", "b", "c", "d", "e"]
        );
        assert_eq!(typing.typing_users("10").await.unwrap(), vec!["z"]);
    }
}
