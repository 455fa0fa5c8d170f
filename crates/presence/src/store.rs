//! Presence storage.
//!
//! A small key space of string sets and expiring string values. Rooms keep
//! membership sets here; typing flags are expiring values enumerated by a
//! cursor scan so no single call walks the whole key space.

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::Instant;

#[derive(Debug, Error)]
pub enum PresenceError {
    #[error("presence store unavailable: {0}")]
    Unavailable(String),
    #[error("key {0} holds the wrong kind of value")]
    WrongType(String),
}

pub type Result<T> = std::result::Result<T, PresenceError>;

/// Position of an incremental scan: the last key examined.
/// The default cursor starts a scan, and a scan is over once it comes back.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanCursor(Option<String>);

impl ScanCursor {
    pub fn start() -> Self {
        Self(None)
    }

    pub fn after(key: impl Into<String>) -> Self {
        Self(Some(key.into()))
    }

    pub fn is_start(&self) -> bool {
        self.0.is_none()
    }
}

/// One page of a cursor scan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanPage {
    /// Cursor for the next call; back at the start when the iteration is complete
    pub cursor: ScanCursor,
    pub keys: Vec<String>,
}

#[async_trait]
pub trait PresenceStore: Send + Sync {
    /// Add `member` to the set at `key`. Returns true if it was not already present.
    async fn set_add(&self, key: &str, member: &str) -> Result<bool>;

    /// Remove `member` from the set at `key`. Missing keys and members are a no-op.
    async fn set_remove(&self, key: &str, member: &str) -> Result<bool>;

    /// Remove `member` from the set at `key` and, in the same step, remove
    /// `parent_member` from `parent_key` if `key` ended up empty. Returns true
    /// if the parent lost its member.
    async fn set_remove_cascade(
        &self,
        key: &str,
        member: &str,
        parent_key: &str,
        parent_member: &str,
    ) -> Result<bool>;

    async fn set_card(&self, key: &str) -> Result<usize>;

    /// Members of the set at `key`, sorted
    async fn set_members(&self, key: &str) -> Result<Vec<String>>;

    /// Store a value that disappears after `ttl`; setting again refreshes it
    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;

    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn del(&self, key: &str) -> Result<bool>;

    /// Examine up to `count` keys under `prefix` after `cursor` and return the
    /// live ones. Start with `ScanCursor::start()` and stop when the returned
    /// cursor is back at the start. Keys present for the whole iteration are
    /// returned exactly once whatever else is written meanwhile. A page may be
    /// empty while the iteration is still running.
    async fn scan(&self, cursor: &ScanCursor, prefix: &str, count: usize) -> Result<ScanPage>;
}

#[derive(Debug, Clone)]
enum Entry {
    Set(BTreeSet<String>),
    Value {
        value: String,
        expires_at: Option<Instant>,
    },
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        match self {
            Entry::Value {
                expires_at: Some(at),
                ..
            } => *at <= now,
            _ => false,
        }
    }
}

/// In-process presence store with lazy expiry
#[derive(Debug, Clone, Default)]
pub struct MemoryPresenceStore {
    entries: Arc<Mutex<BTreeMap<String, Entry>>>,
}

impl MemoryPresenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys, expired values included until they are touched
    pub async fn key_count(&self) -> usize {
        self.entries.lock().await.len()
    }
}

#[async_trait]
impl PresenceStore for MemoryPresenceStore {
    async fn set_add(&self, key: &str, member: &str) -> Result<bool> {
        let mut entries = self.entries.lock().await;
        if entries.get(key).is_some_and(|e| e.is_expired(Instant::now())) {
            entries.remove(key);
        }
        match entries
            .entry(key.to_string())
            .or_insert_with(|| Entry::Set(BTreeSet::new()))
        {
            Entry::Set(members) => Ok(members.insert(member.to_string())),
            Entry::Value { .. } => Err(PresenceError::WrongType(key.to_string())),
        }
    }

    async fn set_remove(&self, key: &str, member: &str) -> Result<bool> {
        let mut entries = self.entries.lock().await;
        let (removed, now_empty) = match entries.get_mut(key) {
            None => return Ok(false),
            Some(Entry::Set(members)) => (members.remove(member), members.is_empty()),
            Some(Entry::Value { .. }) => return Err(PresenceError::WrongType(key.to_string())),
        };
        if now_empty {
            entries.remove(key);
        }
        Ok(removed)
    }

    async fn set_remove_cascade(
        &self,
        key: &str,
        member: &str,
        parent_key: &str,
        parent_member: &str,
    ) -> Result<bool> {
        let mut entries = self.entries.lock().await;
        let now_empty = match entries.get_mut(key) {
            None => true,
            Some(Entry::Set(members)) => {
                members.remove(member);
                members.is_empty()
            }
            Some(Entry::Value { .. }) => return Err(PresenceError::WrongType(key.to_string())),
        };
        if !now_empty {
            return Ok(false);
        }
        entries.remove(key);

        let (removed, parent_empty) = match entries.get_mut(parent_key) {
            None => return Ok(false),
            Some(Entry::Set(members)) => (members.remove(parent_member), members.is_empty()),
            Some(Entry::Value { .. }) => {
                return Err(PresenceError::WrongType(parent_key.to_string()))
            }
        };
        if parent_empty {
            entries.remove(parent_key);
        }
        Ok(removed)
    }

    async fn set_card(&self, key: &str) -> Result<usize> {
        match self.entries.lock().await.get(key) {
            None => Ok(0),
            Some(Entry::Set(members)) => Ok(members.len()),
            Some(Entry::Value { .. }) => Err(PresenceError::WrongType(key.to_string())),
        }
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>> {
        match self.entries.lock().await.get(key) {
            None => Ok(Vec::new()),
            Some(Entry::Set(members)) => Ok(members.iter().cloned().collect()),
            Some(Entry::Value { .. }) => Err(PresenceError::WrongType(key.to_string())),
        }
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let mut entries = self.entries.lock().await;
        if let Some(Entry::Set(_)) = entries.get(key) {
            return Err(PresenceError::WrongType(key.to_string()));
        }
        entries.insert(
            key.to_string(),
            Entry::Value {
                value: value.to_string(),
                expires_at: Some(Instant::now() + ttl),
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut entries = self.entries.lock().await;
        let expired = match entries.get(key) {
            None => return Ok(None),
            Some(Entry::Set(_)) => return Err(PresenceError::WrongType(key.to_string())),
            Some(entry) => entry.is_expired(Instant::now()),
        };
        if expired {
            entries.remove(key);
            return Ok(None);
        }
        match entries.get(key) {
            Some(Entry::Value { value, .. }) => Ok(Some(value.clone())),
            _ => Ok(None),
        }
    }

    async fn del(&self, key: &str) -> Result<bool> {
        let mut entries = self.entries.lock().await;
        match entries.remove(key) {
            Some(entry) => Ok(!entry.is_expired(Instant::now())),
            None => Ok(false),
        }
    }

    async fn scan(&self, cursor: &ScanCursor, prefix: &str, count: usize) -> Result<ScanPage> {
        let entries = self.entries.lock().await;
        let now = Instant::now();
        let count = count.max(1);

        // Keys sharing a prefix are contiguous, so resume right after the last one examined
        let lower = match &cursor.0 {
            Some(last) if last.as_str() >= prefix => Bound::Excluded(last.as_str()),
            _ => Bound::Included(prefix),
        };
        let examined: Vec<(&String, &Entry)> = entries
            .range::<str, _>((lower, Bound::Unbounded))
            .take_while(|(key, _)| key.starts_with(prefix))
            .take(count)
            .collect();

        let cursor = match examined.last() {
            Some((last, _)) if examined.len() == count => ScanCursor::after(last.as_str()),
            _ => ScanCursor::start(),
        };
        let keys = examined
            .into_iter()
            .filter(|(_, entry)| !entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();
        Ok(ScanPage { cursor, keys })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_membership_is_distinct() {
        let store = MemoryPresenceStore::new();
        assert!(store.set_add("room", "alice").await.unwrap());
        assert!(!store.set_add("room", "alice").await.unwrap());
        assert!(store.set_add("room", "bob").await.unwrap());
        assert_eq!(store.set_card("room").await.unwrap(), 2);
        assert_eq!(store.set_members("room").await.unwrap(), vec!["alice", "bob"]);
    }

    #[tokio::test]
    async fn test_empty_set_is_removed() {
        let store = MemoryPresenceStore::new();
        store.set_add("room", "alice").await.unwrap();
        assert!(store.set_remove("room", "alice").await.unwrap());
        assert!(!store.set_remove("room", "alice").await.unwrap());
        assert_eq!(store.key_count().await, 0);
        assert_eq!(store.set_card("room").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_wrong_type() {
        let store = MemoryPresenceStore::new();
        store.set_ex("flag", "1", Duration::from_secs(5)).await.unwrap();
        assert!(matches!(
            store.set_add("flag", "x").await,
            Err(PresenceError::WrongType(_))
        ));
        store.set_add("room", "alice").await.unwrap();
        assert!(matches!(
            store.get("room").await,
            Err(PresenceError::WrongType(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_value_expires_and_refreshes() {
        let store = MemoryPresenceStore::new();
        store.set_ex("flag", "1", Duration::from_secs(5)).await.unwrap();

        tokio::time::advance(Duration::from_secs(3)).await;
        store.set_ex("flag", "1", Duration::from_secs(5)).await.unwrap();
        tokio::time::advance(Duration::from_secs(3)).await;
        assert_eq!(store.get("flag").await.unwrap().as_deref(), Some("1"));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(store.get("flag").await.unwrap(), None);
        assert_eq!(store.key_count().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_del_reports_live_keys_only() {
        let store = MemoryPresenceStore::new();
        store.set_ex("a", "1", Duration::from_secs(5)).await.unwrap();
        store.set_ex("b", "1", Duration::from_secs(1)).await.unwrap();
        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(store.del("a").await.unwrap());
        assert!(!store.del("b").await.unwrap());
        assert!(!store.del("c").await.unwrap());
    }

    #[tokio::test]
    async fn test_scan_pages_through_prefix() {
        let store = MemoryPresenceStore::new();
        for i in 0..25 {
            store
                .set_ex(&format!("match:1:typing:user{:02}", i), "1", Duration::from_secs(60))
                .await
                .unwrap();
        }
        store.set_add("match:1:users", "user00").await.unwrap();
        store
            .set_ex("match:2:typing:other", "1", Duration::from_secs(60))
            .await
            .unwrap();

        let mut cursor = ScanCursor::start();
        let mut found = Vec::new();
        let mut pages = 0;
        loop {
            let page = store.scan(&cursor, "match:1:typing:", 10).await.unwrap();
            assert!(page.keys.len() <= 10);
            found.extend(page.keys);
            pages += 1;
            cursor = page.cursor;
            if cursor.is_start() {
                break;
            }
        }
        assert_eq!(pages, 3);
        assert_eq!(found.len(), 25);
        assert!(found.iter().all(|k| k.starts_with("match:1:typing:")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_scan_skips_expired_values() {
        let store = MemoryPresenceStore::new();
        store.set_ex("t:a", "1", Duration::from_secs(5)).await.unwrap();
        store.set_ex("t:b", "1", Duration::from_secs(10)).await.unwrap();
        tokio::time::advance(Duration::from_secs(6)).await;

        let page = store.scan(&ScanCursor::start(), "t:", 100).await.unwrap();
        assert!(page.cursor.is_start());
        assert_eq!(page.keys, vec!["t:b"]);
    }

    #[tokio::test]
    async fn test_scan_survives_writes_between_pages() {
        let store = MemoryPresenceStore::new();
        for user in ["a", "b", "c", "d"] {
            store
                .set_ex(&format!("match:1:typing:{}", user), "1", Duration::from_secs(60))
                .await
                .unwrap();
        }
        store.set_add("match:0:users", "zed").await.unwrap();

        let first = store
            .scan(&ScanCursor::start(), "match:1:typing:", 2)
            .await
            .unwrap();
        assert_eq!(first.keys, vec!["match:1:typing:a", "match:1:typing:b"]);

        // Other rooms and already returned keys change under the cursor
        store.set_remove("match:0:users", "zed").await.unwrap();
        store.del("match:1:typing:a").await.unwrap();
        store.set_add("match:00:users", "amy").await.unwrap();

        let mut cursor = first.cursor;
        let mut found = first.keys;
        while !cursor.is_start() {
            let page = store.scan(&cursor, "match:1:typing:", 2).await.unwrap();
            found.extend(page.keys);
            cursor = page.cursor;
        }
        assert_eq!(
            found,
            vec![
                "match:1:typing:a",
                "match:1:typing:b",
                "match:1:typing:c",
                "match:1:typing:d"
            ]
        );
    }

    #[tokio::test]
    async fn test_remove_cascade_only_when_emptied() {
        let store = MemoryPresenceStore::new();
        store.set_add("user:sessions", "s1").await.unwrap();
        store.set_add("user:sessions", "s2").await.unwrap();
        store.set_add("users", "alice").await.unwrap();

        assert!(!store
            .set_remove_cascade("user:sessions", "s1", "users", "alice")
            .await
            .unwrap());
        assert_eq!(store.set_members("users").await.unwrap(), vec!["alice"]);

        assert!(store
            .set_remove_cascade("user:sessions", "s2", "users", "alice")
            .await
            .unwrap());
        assert_eq!(store.key_count().await, 0);

        // Nothing left to remove
        assert!(!store
            .set_remove_cascade("user:sessions", "s2", "users", "alice")
            .await
            .unwrap());
    }
}
