// Match Statistics
//
// Per-side counters derived from a match's recorded events, plus the detail
// view served by `matchcast show`.

use crate::error::MatchcastError;
use crate::model::{Match, MatchEvent, MatchEventType, Side};
use crate::store::MatchStore;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SideStats {
    pub shots: u32,
    pub fouls: u32,
    pub yellow_cards: u32,
    pub red_cards: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchStats {
    pub home: SideStats,
    pub away: SideStats,
}

impl MatchStats {
    /// Tally events for `m`. Events without a team are ignored; events whose
    /// team plays on neither side are skipped with a warning.
    pub fn from_events(m: &Match, events: &[MatchEvent]) -> Self {
        let mut stats = Self::default();
        for event in events {
            let Some(team) = &event.team else {
                continue;
            };
            let Some(side) = m.side_of(&team.id) else {
                tracing::warn!(
                    "Event {} of match {} names team {} which plays on neither side",
                    event.id,
                    m.id,
                    team.id
                );
                continue;
            };
            let counters = stats.side_mut(side);
            match event.event_type {
                MatchEventType::Shot => counters.shots += 1,
                MatchEventType::Foul => counters.fouls += 1,
                MatchEventType::YellowCard => counters.yellow_cards += 1,
                MatchEventType::RedCard => counters.red_cards += 1,
                _ => {}
            }
        }
        stats
    }

    pub fn side(&self, side: Side) -> &SideStats {
        match side {
            Side::Home => &self.home,
            Side::Away => &self.away,
        }
    }

    fn side_mut(&mut self, side: Side) -> &mut SideStats {
        match side {
            Side::Home => &mut self.home,
            Side::Away => &mut self.away,
        }
    }
}

/// A match with its event history and computed statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchDetail {
    #[serde(flatten)]
    pub summary: Match,
    pub events: Vec<MatchEvent>,
    pub stats: MatchStats,
}

pub async fn load_match_detail(store: &dyn MatchStore, id: &str) -> Result<MatchDetail, MatchcastError> {
    let summary = store
        .find_match(id)
        .await?
        .ok_or_else(|| MatchcastError::match_not_found(id))?;
    let events = store.events_for(id).await?;
    let stats = MatchStats::from_events(&summary, &events);
    Ok(MatchDetail {
        summary,
        events,
        stats,
    })
}
