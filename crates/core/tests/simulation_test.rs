// Simulation Scenario Test
//
// Seeds a SQLite database, drives the scheduler tick by tick and checks the
// persisted state, the published notifications and the detail view.

use matchcast_core::simulation::{LifecycleDriver, TickOutcome, TickScheduler};
use matchcast_core::{
    load_match_detail, MatchEventType, MatchStatus, MatchStore, Notification, NotificationBus,
    SimulationConfig, SqliteStore,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use tempfile::TempDir;

#[tokio::test]
async fn test_seeded_matches_play_to_full_time() {
    let temp_dir = TempDir::new().unwrap();
    let store = Arc::new(SqliteStore::open(temp_dir.path().join("matchcast.db")).unwrap());
    let seeded = store.seed_defaults().await.unwrap();
    assert_eq!(seeded.len(), 3);

    let bus = NotificationBus::new();
    let mut rx = bus.subscribe();
    let config = SimulationConfig::default();
    let driver = LifecycleDriver::new(store.clone(), bus, &config).with_rng(StdRng::seed_from_u64(2024));
    let scheduler = TickScheduler::new(store.clone(), driver, &config);

    let mut ticks = 0;
    loop {
        let report = scheduler.run_tick().await;
        assert_eq!(report.outcome, TickOutcome::Succeeded);
        if report.advanced == 0 {
            break;
        }
        ticks += 1;
        assert!(ticks < 200, "simulation did not finish");
    }
    assert_eq!(ticks, 90);

    for m in store.list_matches().await.unwrap() {
        assert_eq!(m.status, MatchStatus::FullTime);
        assert_eq!(m.minute, 90);

        let detail = load_match_detail(store.as_ref(), &m.id).await.unwrap();
        let goals = detail
            .events
            .iter()
            .filter(|e| e.event_type == MatchEventType::Goal)
            .count() as u32;
        assert_eq!(goals, m.home_score + m.away_score);
        assert!(detail.events.windows(2).all(|w| w[0].minute <= w[1].minute));
    }

    // Every event notification follows the update for the same minute
    let mut last_update_minute = std::collections::HashMap::new();
    while let Ok(notification) = rx.try_recv() {
        match notification {
            Notification::MatchUpdated(m) => {
                last_update_minute.insert(m.id.clone(), m.minute);
            }
            Notification::MatchEvent(e) => {
                assert_eq!(last_update_minute.get(&e.match_id), Some(&e.minute));
            }
        }
    }
}
