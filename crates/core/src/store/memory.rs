use super::MatchStore;
use crate::error::MatchcastError;
use crate::model::{Match, MatchEvent, MatchStatus, Team};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Process-local store used by tests and `serve --in-memory`
#[derive(Clone, Default)]
pub struct InMemoryStore {
    teams: Arc<RwLock<HashMap<String, Team>>>,
    matches: Arc<RwLock<HashMap<String, Match>>>,
    events: Arc<RwLock<Vec<MatchEvent>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_team(&self, team: Team) {
        self.teams.write().await.insert(team.id.clone(), team);
    }

    pub async fn insert_match(&self, m: Match) {
        let mut teams = self.teams.write().await;
        teams
            .entry(m.home_team.id.clone())
            .or_insert_with(|| m.home_team.clone());
        teams
            .entry(m.away_team.id.clone())
            .or_insert_with(|| m.away_team.clone());
        drop(teams);
        self.matches.write().await.insert(m.id.clone(), m);
    }

    /// Five reference teams and three first-half matches between neighbours
    pub async fn seed_defaults(&self) -> Vec<Match> {
        let teams = super::default_teams();
        let mut seeded = Vec::new();
        for pair in teams.windows(2).take(3) {
            let m = Match::new(pair[0].clone(), pair[1].clone()).with_status(MatchStatus::FirstHalf);
            self.insert_match(m.clone()).await;
            seeded.push(m);
        }
        for team in teams {
            self.insert_team(team).await;
        }
        seeded
    }

    pub async fn event_count(&self) -> usize {
        self.events.read().await.len()
    }
}

#[async_trait]
impl MatchStore for InMemoryStore {
    async fn load_live_matches(&self, statuses: &[MatchStatus]) -> Result<Vec<Match>, MatchcastError> {
        let matches = self.matches.read().await;
        Ok(matches
            .values()
            .filter(|m| statuses.contains(&m.status))
            .cloned()
            .collect())
    }

    async fn save(&self, m: &Match) -> Result<Match, MatchcastError> {
        self.matches.write().await.insert(m.id.clone(), m.clone());
        Ok(m.clone())
    }

    async fn create_event(&self, event: &MatchEvent) -> Result<MatchEvent, MatchcastError> {
        if !self.matches.read().await.contains_key(&event.match_id) {
            return Err(MatchcastError::match_not_found(&event.match_id));
        }
        self.events.write().await.push(event.clone());
        Ok(event.clone())
    }

    async fn list_matches(&self) -> Result<Vec<Match>, MatchcastError> {
        let mut matches: Vec<Match> = self.matches.read().await.values().cloned().collect();
        matches.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        Ok(matches)
    }

    async fn find_match(&self, id: &str) -> Result<Option<Match>, MatchcastError> {
        Ok(self.matches.read().await.get(id).cloned())
    }

    async fn events_for(&self, match_id: &str) -> Result<Vec<MatchEvent>, MatchcastError> {
        Ok(self
            .events
            .read()
            .await
            .iter()
            .filter(|e| e.match_id == match_id)
            .cloned()
            .collect())
    }
}
