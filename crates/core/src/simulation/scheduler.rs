//! Periodic tick over all live matches.
//!
//! A tick loads the live set and advances each match once. Transient failures
//! retry the whole batch after a fixed delay; matches already persisted during
//! an earlier attempt of the same tick are skipped so nothing advances twice.

use super::lifecycle::LifecycleDriver;
use crate::config::SimulationConfig;
use crate::error::MatchcastError;
use crate::model::MatchStatus;
use crate::store::MatchStore;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Succeeded,
    /// Gave up on this cycle; the next one starts from persisted state
    Dropped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub attempts: u32,
    /// Matches advanced during this tick, across all attempts
    pub advanced: usize,
    pub outcome: TickOutcome,
}

pub struct TickScheduler {
    store: Arc<dyn MatchStore>,
    driver: LifecycleDriver,
    interval: Duration,
    max_retries: u32,
    retry_delay: Duration,
}

impl TickScheduler {
    pub fn new(store: Arc<dyn MatchStore>, driver: LifecycleDriver, config: &SimulationConfig) -> Self {
        Self {
            store,
            driver,
            interval: config.tick_interval(),
            max_retries: config.max_retries,
            retry_delay: config.retry_delay(),
        }
    }

    /// Run one tick, retrying the batch on transient failures.
    pub async fn run_tick(&self) -> TickReport {
        let mut advanced = HashSet::new();
        let mut attempts = 0;

        loop {
            attempts += 1;
            let result = self.run_batch(&mut advanced).await;
            let err = match result {
                Ok(()) => {
                    tracing::debug!("Simulation tick advanced {} matches", advanced.len());
                    return TickReport {
                        attempts,
                        advanced: advanced.len(),
                        outcome: TickOutcome::Succeeded,
                    };
                }
                Err(err) => err,
            };

            if !err.is_transient() {
                tracing::error!("Simulation tick aborted: {}", err);
                break;
            }
            if attempts > self.max_retries {
                tracing::error!(
                    "Error during simulation tick after {} retries: {}",
                    self.max_retries,
                    err
                );
                break;
            }
            tracing::warn!(
                "Simulation tick failed (attempt {}), retrying in {:?}... Error: {}",
                attempts,
                self.retry_delay,
                err
            );
            tokio::time::sleep(self.retry_delay).await;
        }

        TickReport {
            attempts,
            advanced: advanced.len(),
            outcome: TickOutcome::Dropped,
        }
    }

    async fn run_batch(&self, advanced: &mut HashSet<String>) -> Result<(), MatchcastError> {
        let live = self.store.load_live_matches(&MatchStatus::LIVE).await?;
        for m in live {
            if advanced.contains(&m.id) {
                continue;
            }
            let id = m.id.clone();
            match self.driver.tick(m).await {
                Ok(_) => {
                    advanced.insert(id);
                }
                Err(err) => {
                    if err.persisted {
                        advanced.insert(err.match_id);
                    }
                    return Err(err.source);
                }
            }
        }
        Ok(())
    }

    /// Tick every interval until `shutdown` flips to true or its sender is dropped.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick completes immediately; the first simulated minute waits a full interval
        ticker.tick().await;
        tracing::info!("Match simulation started (interval {:?})", self.interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let report = self.run_tick().await;
                    if report.outcome == TickOutcome::Dropped {
                        tracing::warn!("Simulation tick dropped after {} attempts", report.attempts);
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        tracing::info!("Match simulation stopped");
    }
}
