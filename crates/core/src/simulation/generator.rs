//! Per-minute event sampling.
//!
//! One uniform draw is mapped onto cumulative bands, first match wins. Anything
//! above the last band means nothing happened this minute.

use crate::model::{Match, MatchEventType, Side, Team};
use rand::{Rng, RngCore};

/// Cumulative upper bounds, checked in order
pub const EVENT_BANDS: [(f64, MatchEventType); 6] = [
    (0.028, MatchEventType::Goal),
    (0.073, MatchEventType::YellowCard),
    (0.139, MatchEventType::Substitution),
    (0.249, MatchEventType::Foul),
    (0.379, MatchEventType::Shot),
    (0.3806, MatchEventType::RedCard),
];

/// An outcome drawn for one minute, not yet applied or recorded
#[derive(Debug, Clone, PartialEq)]
pub struct SampledEvent {
    pub event_type: MatchEventType,
    pub side: Side,
    pub player: String,
}

impl SampledEvent {
    /// Apply the outcome's effect on the match state (only goals change it)
    pub fn apply(&self, m: &mut Match) {
        if self.event_type == MatchEventType::Goal {
            m.score_for(self.side);
        }
    }

    pub fn team<'a>(&self, m: &'a Match) -> &'a Team {
        m.team(self.side)
    }
}

#[derive(Debug, Clone)]
pub struct EventGenerator {
    roster: Vec<String>,
}

impl EventGenerator {
    pub fn new(roster: Vec<String>) -> Self {
        Self { roster }
    }

    pub fn classify(p: f64) -> Option<MatchEventType> {
        EVENT_BANDS
            .iter()
            .find(|(upper, _)| p < *upper)
            .map(|(_, kind)| *kind)
    }

    pub fn sample(&self, rng: &mut dyn RngCore) -> Option<SampledEvent> {
        let event_type = Self::classify(rng.gen::<f64>())?;
        let side = if rng.gen_bool(0.5) {
            Side::Home
        } else {
            Side::Away
        };
        Some(SampledEvent {
            event_type,
            side,
            player: self.pick_player(rng),
        })
    }

    /// Uniform roster pick; an empty roster yields an unnamed player
    pub fn pick_player(&self, rng: &mut dyn RngCore) -> String {
        if self.roster.is_empty() {
            return String::new();
        }
        self.roster[rng.gen_range(0..self.roster.len())].clone()
    }
}
