//! Per-match lifecycle.
//!
//! The pure functions [`step`] and [`close_period`] mutate an in-memory match;
//! [`LifecycleDriver`] wraps them with persistence and notification in the order
//! mutate -> persist -> publish update -> publish events -> period transition.

use super::generator::{EventGenerator, SampledEvent};
use crate::config::SimulationConfig;
use crate::error::MatchcastError;
use crate::model::{Match, MatchEvent, MatchEventType, MatchStatus};
use crate::notify::{Notification, NotificationBus};
use crate::store::MatchStore;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use std::fmt;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleRules {
    pub first_half_end_minute: u32,
    pub full_time_minute: u32,
    pub half_time_minutes: u32,
}

impl Default for LifecycleRules {
    fn default() -> Self {
        Self::from(&SimulationConfig::default())
    }
}

impl From<&SimulationConfig> for LifecycleRules {
    fn from(config: &SimulationConfig) -> Self {
        Self {
            first_half_end_minute: config.first_half_end_minute,
            full_time_minute: config.full_time_minute,
            half_time_minutes: config.half_time_minutes,
        }
    }
}

/// What one call to [`step`] did
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Match is not live; nothing changed
    Idle,
    /// Half-time clock advanced; `resumed` when the second half kicked off
    HalfTime { resumed: bool },
    /// A playing minute elapsed, with at most one sampled event already applied
    Played { sampled: Option<SampledEvent> },
}

/// Advance the match clock by one minute.
pub fn step(m: &mut Match, rules: &LifecycleRules, sampled: Option<SampledEvent>) -> Step {
    match m.status {
        MatchStatus::HalfTime => {
            let started = *m.half_time_start.get_or_insert(m.minute);
            m.minute += 1;
            let resumed = m.minute.saturating_sub(started) >= rules.half_time_minutes;
            if resumed {
                m.status = MatchStatus::SecondHalf;
            }
            Step::HalfTime { resumed }
        }
        MatchStatus::FirstHalf | MatchStatus::SecondHalf => {
            m.minute += 1;
            if let Some(event) = &sampled {
                event.apply(m);
            }
            Step::Played { sampled }
        }
        MatchStatus::NotStarted | MatchStatus::FullTime => Step::Idle,
    }
}

/// Close the current period if its final minute has been reached.
/// Returns true when the status moved on.
pub fn close_period(m: &mut Match, rules: &LifecycleRules) -> bool {
    match m.status {
        MatchStatus::FirstHalf if m.minute >= rules.first_half_end_minute => {
            m.status = MatchStatus::HalfTime;
            m.half_time_start = Some(m.minute);
            true
        }
        MatchStatus::SecondHalf if m.minute >= rules.full_time_minute => {
            m.status = MatchStatus::FullTime;
            true
        }
        _ => false,
    }
}

fn ensure_forward(before: (MatchStatus, u32), m: &Match) -> Result<(), MatchcastError> {
    let (status, minute) = before;
    if m.minute < minute {
        return Err(MatchcastError::invariant(format!(
            "match {} minute went from {} to {}",
            m.id, minute, m.minute
        )));
    }
    if m.status != status && status.next() != Some(m.status) {
        return Err(MatchcastError::invariant(format!(
            "match {} cannot move from {} to {}",
            m.id, status, m.status
        )));
    }
    Ok(())
}

/// Failure while advancing one match
#[derive(Debug)]
pub struct AdvanceError {
    pub match_id: String,
    /// Whether the advanced match state reached the store before the failure
    pub persisted: bool,
    pub source: MatchcastError,
}

impl fmt::Display for AdvanceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "advancing match {} failed: {}", self.match_id, self.source)
    }
}

impl std::error::Error for AdvanceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

/// Drives one match through one tick against the store and the bus
pub struct LifecycleDriver {
    store: Arc<dyn MatchStore>,
    bus: NotificationBus,
    generator: EventGenerator,
    rules: LifecycleRules,
    rng: Mutex<Box<dyn RngCore + Send>>,
}

impl LifecycleDriver {
    pub fn new(store: Arc<dyn MatchStore>, bus: NotificationBus, config: &SimulationConfig) -> Self {
        Self {
            store,
            bus,
            generator: EventGenerator::new(config.players.clone()),
            rules: LifecycleRules::from(config),
            rng: Mutex::new(Box::new(StdRng::from_entropy())),
        }
    }

    /// Replace the random source (deterministic simulations and tests)
    pub fn with_rng(mut self, rng: impl RngCore + Send + 'static) -> Self {
        self.rng = Mutex::new(Box::new(rng));
        self
    }

    pub fn rules(&self) -> &LifecycleRules {
        &self.rules
    }

    fn sample(&self) -> Option<SampledEvent> {
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        self.generator.sample(rng.as_mut())
    }

    /// Advance `m` by exactly one tick and return the persisted state.
    pub async fn tick(&self, mut m: Match) -> Result<Match, AdvanceError> {
        let match_id = m.id.clone();
        let mut persisted = false;
        let fail = |persisted: bool| {
            let match_id = match_id.clone();
            move |source: MatchcastError| AdvanceError {
                match_id,
                persisted,
                source,
            }
        };

        let before = (m.status, m.minute);
        let sampled = match m.status {
            MatchStatus::FirstHalf | MatchStatus::SecondHalf => self.sample(),
            _ => None,
        };

        match step(&mut m, &self.rules, sampled) {
            Step::Idle => Ok(m),
            Step::HalfTime { resumed } => {
                ensure_forward(before, &m).map_err(fail(persisted))?;
                let saved = self.store.save(&m).await.map_err(fail(persisted))?;
                if resumed {
                    tracing::info!("Match {} second half kicked off at minute {}", saved.id, saved.minute);
                }
                self.bus.publish(Notification::MatchUpdated(saved.clone()));
                Ok(saved)
            }
            Step::Played { sampled } => {
                ensure_forward(before, &m).map_err(fail(persisted))?;
                let saved = self.store.save(&m).await.map_err(fail(persisted))?;
                persisted = true;

                let recorded = match sampled {
                    Some(event) => {
                        let record = MatchEvent::record(
                            &saved,
                            event.event_type,
                            Some(event.team(&saved).clone()),
                            Some(event.player.clone()),
                        );
                        Some(self.store.create_event(&record).await.map_err(fail(persisted))?)
                    }
                    None => None,
                };

                self.bus.publish(Notification::MatchUpdated(saved.clone()));
                if let Some(event) = recorded {
                    tracing::debug!(
                        "Match {} minute {}: {} ({})",
                        saved.id,
                        event.minute,
                        event.event_type,
                        event.player.as_deref().unwrap_or("-")
                    );
                    self.bus.publish(Notification::MatchEvent(event));
                }

                let mut m = saved;
                let before = (m.status, m.minute);
                if !close_period(&mut m, &self.rules) {
                    return Ok(m);
                }
                ensure_forward(before, &m).map_err(fail(persisted))?;
                let saved = self.store.save(&m).await.map_err(fail(persisted))?;
                let period_end = MatchEvent::record(&saved, MatchEventType::PeriodEnd, None, None);
                let period_end = self
                    .store
                    .create_event(&period_end)
                    .await
                    .map_err(fail(persisted))?;
                tracing::info!(
                    "Match {} reached {} at minute {}",
                    saved.id,
                    saved.status,
                    saved.minute
                );
                self.bus.publish(Notification::MatchEvent(period_end));
                Ok(saved)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Side, Team};
    use crate::store::InMemoryStore;
    use rand::rngs::mock::StepRng;
    use tokio::sync::broadcast::error::TryRecvError;

    fn live_match(status: MatchStatus, minute: u32) -> Match {
        Match::new(Team::new("Arsenal", "ARS"), Team::new("Chelsea", "CHE"))
            .with_status(status)
            .with_minute(minute)
    }

    fn quiet_driver(store: Arc<InMemoryStore>, bus: NotificationBus) -> LifecycleDriver {
        // A draw just below 1.0 never lands in an event band
        LifecycleDriver::new(store, bus, &SimulationConfig::default())
            .with_rng(StepRng::new(u64::MAX, 0))
    }

    #[test]
    fn test_step_half_time_waits_fifteen_minutes() {
        let rules = LifecycleRules::default();
        let mut m = live_match(MatchStatus::HalfTime, 45);
        for _ in 0..14 {
            assert_eq!(step(&mut m, &rules, None), Step::HalfTime { resumed: false });
        }
        assert_eq!(m.half_time_start, Some(45));
        assert_eq!(m.status, MatchStatus::HalfTime);
        assert_eq!(step(&mut m, &rules, None), Step::HalfTime { resumed: true });
        assert_eq!(m.status, MatchStatus::SecondHalf);
        assert_eq!(m.minute, 60);
    }

    #[test]
    fn test_step_ignores_sampled_event_during_half_time() {
        let rules = LifecycleRules::default();
        let mut m = live_match(MatchStatus::HalfTime, 50);
        m.half_time_start = Some(45);
        let goal = SampledEvent {
            event_type: MatchEventType::Goal,
            side: Side::Home,
            player: "Saka".to_string(),
        };
        step(&mut m, &rules, Some(goal));
        assert_eq!(m.home_score, 0);
    }

    #[test]
    fn test_step_idle_statuses() {
        let rules = LifecycleRules::default();
        for status in [MatchStatus::NotStarted, MatchStatus::FullTime] {
            let mut m = live_match(status, 90);
            assert_eq!(step(&mut m, &rules, None), Step::Idle);
            assert_eq!(m.minute, 90);
            assert_eq!(m.status, status);
        }
    }

    #[test]
    fn test_close_period_thresholds() {
        let rules = LifecycleRules::default();
        let mut m = live_match(MatchStatus::FirstHalf, 44);
        assert!(!close_period(&mut m, &rules));
        m.minute = 45;
        assert!(close_period(&mut m, &rules));
        assert_eq!(m.status, MatchStatus::HalfTime);
        assert_eq!(m.half_time_start, Some(45));

        let mut m = live_match(MatchStatus::SecondHalf, 90);
        assert!(close_period(&mut m, &rules));
        assert_eq!(m.status, MatchStatus::FullTime);
    }

    #[test]
    fn test_ensure_forward_rejects_skips() {
        let m = live_match(MatchStatus::SecondHalf, 50);
        assert!(ensure_forward((MatchStatus::FirstHalf, 50), &m).is_err());
        assert!(ensure_forward((MatchStatus::SecondHalf, 51), &m).is_err());
        assert!(ensure_forward((MatchStatus::HalfTime, 49), &m).is_ok());
    }

    #[tokio::test]
    async fn test_tick_minute_44_closes_first_half() {
        let store = Arc::new(InMemoryStore::new());
        let bus = NotificationBus::new();
        let mut rx = bus.subscribe();
        let m = live_match(MatchStatus::FirstHalf, 44);
        store.insert_match(m.clone()).await;

        let driver = quiet_driver(store.clone(), bus.clone());
        let after = driver.tick(m.clone()).await.unwrap();
        assert_eq!(after.minute, 45);
        assert_eq!(after.status, MatchStatus::HalfTime);

        match rx.try_recv().unwrap() {
            Notification::MatchUpdated(update) => {
                assert_eq!(update.minute, 45);
                assert_eq!(update.status, MatchStatus::FirstHalf);
            }
            other => panic!("expected update first, got {:?}", other),
        }
        match rx.try_recv().unwrap() {
            Notification::MatchEvent(event) => {
                assert_eq!(event.event_type, MatchEventType::PeriodEnd);
                assert_eq!(event.minute, 45);
            }
            other => panic!("expected period end, got {:?}", other),
        }
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));

        let stored = store.find_match(&m.id).await.unwrap().unwrap();
        assert_eq!(stored.status, MatchStatus::HalfTime);
        assert_eq!(stored.half_time_start, Some(45));
        assert_eq!(store.events_for(&m.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_goal_updates_score_and_records_event_at_new_minute() {
        let store = Arc::new(InMemoryStore::new());
        let bus = NotificationBus::new();
        let mut rx = bus.subscribe();
        let m = live_match(MatchStatus::SecondHalf, 70);
        store.insert_match(m.clone()).await;

        // Zero draw: goal band, home side, first roster entry
        let driver = LifecycleDriver::new(store.clone(), bus.clone(), &SimulationConfig::default())
            .with_rng(StepRng::new(0, 0));
        let after = driver.tick(m.clone()).await.unwrap();
        assert_eq!(after.home_score, 1);

        let update = rx.try_recv().unwrap();
        let event = rx.try_recv().unwrap();
        match (update, event) {
            (Notification::MatchUpdated(update), Notification::MatchEvent(event)) => {
                assert_eq!(update.home_score, 1);
                assert_eq!(event.event_type, MatchEventType::Goal);
                assert_eq!(event.minute, update.minute);
                assert_eq!(event.team.as_ref(), Some(&m.home_team));
            }
            other => panic!("unexpected order {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_half_time_tick_persists_and_publishes_without_events() {
        let store = Arc::new(InMemoryStore::new());
        let bus = NotificationBus::new();
        let mut rx = bus.subscribe();
        let m = live_match(MatchStatus::HalfTime, 47);
        store.insert_match(m.clone()).await;

        let driver = LifecycleDriver::new(store.clone(), bus.clone(), &SimulationConfig::default())
            .with_rng(StepRng::new(0, 0));
        let after = driver.tick(m.clone()).await.unwrap();
        assert_eq!(after.minute, 48);
        assert_eq!(after.half_time_start, Some(47));
        assert!(matches!(rx.try_recv(), Ok(Notification::MatchUpdated(_))));
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
        assert_eq!(store.event_count().await, 0);
    }

    #[tokio::test]
    async fn test_full_match_walks_every_status_in_order() {
        let store = Arc::new(InMemoryStore::new());
        let bus = NotificationBus::new();
        let mut m = live_match(MatchStatus::FirstHalf, 0);
        store.insert_match(m.clone()).await;
        let driver = LifecycleDriver::new(store.clone(), bus, &SimulationConfig::default())
            .with_rng(StdRng::seed_from_u64(42));

        let mut statuses = vec![m.status];
        let mut half_time_ticks = 0;
        while m.status != MatchStatus::FullTime {
            let previous_minute = m.minute;
            if m.status == MatchStatus::HalfTime {
                half_time_ticks += 1;
            }
            m = driver.tick(m).await.unwrap();
            assert!(m.minute > previous_minute);
            if statuses.last() != Some(&m.status) {
                statuses.push(m.status);
            }
        }

        assert_eq!(
            statuses,
            vec![
                MatchStatus::FirstHalf,
                MatchStatus::HalfTime,
                MatchStatus::SecondHalf,
                MatchStatus::FullTime
            ]
        );
        assert!(half_time_ticks >= 15);
        assert_eq!(m.minute, 90);

        let events = store.events_for(&m.id).await.unwrap();
        let period_ends: Vec<u32> = events
            .iter()
            .filter(|e| e.event_type == MatchEventType::PeriodEnd)
            .map(|e| e.minute)
            .collect();
        assert_eq!(period_ends, vec![45, 90]);
        let goals = events.iter().filter(|e| e.event_type == MatchEventType::Goal).count() as u32;
        assert_eq!(goals, m.home_score + m.away_score);

        // Further ticks are no-ops
        let idle = driver.tick(m.clone()).await.unwrap();
        assert_eq!(idle, m);
    }
}
