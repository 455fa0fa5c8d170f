// Presence Scenario Test
//
// Rooms and typing flags sharing one store, the way the gateway wires them.

use matchcast_core::config::PresenceConfig;
use matchcast_presence::{MemoryPresenceStore, PresenceStore, RoomRegistry, TypingTracker};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn test_room_and_typing_share_store() {
    let store = Arc::new(MemoryPresenceStore::new());
    let rooms = RoomRegistry::new(store.clone());
    let typing = TypingTracker::new(store.clone(), &PresenceConfig::default());

    rooms.join("m1", "alice", "s1").await.unwrap();
    rooms.join("m1", "bob", "s2").await.unwrap();
    typing.set_typing("m1", "alice", true).await.unwrap();
    typing.set_typing("m1", "bob", true).await.unwrap();

    // Membership keys never show up as typing users
    assert_eq!(typing.typing_users("m1").await.unwrap(), vec!["alice", "bob"]);

    tokio::time::advance(Duration::from_secs(3)).await;
    typing.set_typing("m1", "bob", true).await.unwrap();
    tokio::time::advance(Duration::from_secs(3)).await;
    assert_eq!(typing.typing_users("m1").await.unwrap(), vec!["bob"]);

    // Membership does not expire
    assert_eq!(rooms.active_user_count("m1").await.unwrap(), 2);
}

#[tokio::test]
async fn test_concurrent_joins_count_distinct_users() {
    let store = Arc::new(MemoryPresenceStore::new());
    let rooms = RoomRegistry::new(store.clone());

    let mut handles = Vec::new();
    for i in 0..20 {
        let rooms = rooms.clone();
        handles.push(tokio::spawn(async move {
            let user = format!("user{}", i % 5);
            rooms.join("m1", &user, &format!("session{}", i)).await.unwrap()
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(rooms.active_user_count("m1").await.unwrap(), 5);
    assert_eq!(rooms.session_count("m1").await.unwrap(), 20);
    assert_eq!(store.set_card("match:m1:user:user0:sessions").await.unwrap(), 4);
}
