// Match Persistence
//
// The simulation and the read commands only talk to storage through `MatchStore`.
// Writes are atomic per match row; nothing here coordinates across matches.

mod memory;
mod sqlite;

pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;

use crate::error::MatchcastError;
use crate::model::{Match, MatchEvent, MatchStatus};
use async_trait::async_trait;

#[async_trait]
pub trait MatchStore: Send + Sync {
    /// Load every match whose status is in `statuses`, teams included
    async fn load_live_matches(&self, statuses: &[MatchStatus]) -> Result<Vec<Match>, MatchcastError>;

    /// Persist the full state of one match
    async fn save(&self, m: &Match) -> Result<Match, MatchcastError>;

    /// Append an event to its match's history
    async fn create_event(&self, event: &MatchEvent) -> Result<MatchEvent, MatchcastError>;

    /// All matches, newest start time first
    async fn list_matches(&self) -> Result<Vec<Match>, MatchcastError>;

    async fn find_match(&self, id: &str) -> Result<Option<Match>, MatchcastError>;

    /// Events of one match in the order they were recorded
    async fn events_for(&self, match_id: &str) -> Result<Vec<MatchEvent>, MatchcastError>;
}

/// Reference teams inserted by the seeding commands
pub(crate) fn default_teams() -> Vec<crate::model::Team> {
    [
        ("Arsenal", "ARS"),
        ("Manchester City", "MCI"),
        ("Liverpool", "LIV"),
        ("Chelsea", "CHE"),
        ("Manchester United", "MUN"),
    ]
    .into_iter()
    .map(|(name, code)| crate::model::Team {
        logo_url: Some(format!("https://example.com/{}.png", code.to_lowercase())),
        ..crate::model::Team::new(name, code)
    })
    .collect()
}
