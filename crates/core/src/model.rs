//! Match, team and event types shared by the simulation, the stores and the gateway.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    pub id: String,
    pub name: String,
    pub short_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,
}

impl Team {
    pub fn new(name: impl Into<String>, short_code: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            short_code: short_code.into(),
            logo_url: None,
        }
    }
}

/// Match lifecycle status. Variants are declared in lifecycle order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchStatus {
    NotStarted,
    FirstHalf,
    HalfTime,
    SecondHalf,
    FullTime,
}

impl MatchStatus {
    /// Statuses the tick scheduler advances
    pub const LIVE: [MatchStatus; 3] = [
        MatchStatus::FirstHalf,
        MatchStatus::SecondHalf,
        MatchStatus::HalfTime,
    ];

    pub fn is_live(self) -> bool {
        Self::LIVE.contains(&self)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "NOT_STARTED",
            Self::FirstHalf => "FIRST_HALF",
            Self::HalfTime => "HALF_TIME",
            Self::SecondHalf => "SECOND_HALF",
            Self::FullTime => "FULL_TIME",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "NOT_STARTED" => Some(Self::NotStarted),
            "FIRST_HALF" => Some(Self::FirstHalf),
            "HALF_TIME" => Some(Self::HalfTime),
            "SECOND_HALF" => Some(Self::SecondHalf),
            "FULL_TIME" => Some(Self::FullTime),
            _ => None,
        }
    }

    /// The only status this one may move to
    pub fn next(self) -> Option<Self> {
        match self {
            Self::NotStarted => Some(Self::FirstHalf),
            Self::FirstHalf => Some(Self::HalfTime),
            Self::HalfTime => Some(Self::SecondHalf),
            Self::SecondHalf => Some(Self::FullTime),
            Self::FullTime => None,
        }
    }
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Home,
    Away,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Match {
    pub id: String,
    pub home_team: Team,
    pub away_team: Team,
    pub home_score: u32,
    pub away_score: u32,
    pub minute: u32,
    pub status: MatchStatus,
    pub start_time: DateTime<Utc>,
    /// Minute at which half-time began; carried on the wire as `details.halfTimeStart`
    #[serde(rename = "details", with = "details", default)]
    pub half_time_start: Option<u32>,
}

impl Match {
    pub fn new(home_team: Team, away_team: Team) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            home_team,
            away_team,
            home_score: 0,
            away_score: 0,
            minute: 0,
            status: MatchStatus::NotStarted,
            start_time: Utc::now(),
            half_time_start: None,
        }
    }

    pub fn with_status(mut self, status: MatchStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_minute(mut self, minute: u32) -> Self {
        self.minute = minute;
        self
    }

    pub fn team(&self, side: Side) -> &Team {
        match side {
            Side::Home => &self.home_team,
            Side::Away => &self.away_team,
        }
    }

    /// Which side a team id plays on, if it plays in this match at all
    pub fn side_of(&self, team_id: &str) -> Option<Side> {
        if team_id == self.home_team.id {
            Some(Side::Home)
        } else if team_id == self.away_team.id {
            Some(Side::Away)
        } else {
            None
        }
    }

    pub fn score_for(&mut self, side: Side) {
        match side {
            Side::Home => self.home_score += 1,
            Side::Away => self.away_score += 1,
        }
    }
}

mod details {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Default, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Details {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        half_time_start: Option<u32>,
    }

    pub fn serialize<S: Serializer>(value: &Option<u32>, serializer: S) -> Result<S::Ok, S::Error> {
        Details {
            half_time_start: *value,
        }
        .serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u32>, D::Error> {
        let details: Option<Details> = Option::deserialize(deserializer)?;
        Ok(details.and_then(|d| d.half_time_start))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchEventType {
    Goal,
    YellowCard,
    RedCard,
    Foul,
    Shot,
    Substitution,
    PeriodEnd,
}

impl MatchEventType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Goal => "GOAL",
            Self::YellowCard => "YELLOW_CARD",
            Self::RedCard => "RED_CARD",
            Self::Foul => "FOUL",
            Self::Shot => "SHOT",
            Self::Substitution => "SUBSTITUTION",
            Self::PeriodEnd => "PERIOD_END",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "GOAL" => Some(Self::Goal),
            "YELLOW_CARD" => Some(Self::YellowCard),
            "RED_CARD" => Some(Self::RedCard),
            "FOUL" => Some(Self::Foul),
            "SHOT" => Some(Self::Shot),
            "SUBSTITUTION" => Some(Self::Substitution),
            "PERIOD_END" => Some(Self::PeriodEnd),
            _ => None,
        }
    }
}

impl fmt::Display for MatchEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Append-only record of something that happened in a match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchEvent {
    pub id: String,
    pub match_id: String,
    #[serde(rename = "type")]
    pub event_type: MatchEventType,
    pub minute: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team: Option<Team>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl MatchEvent {
    /// Record an event at the match's current minute
    pub fn record(
        m: &Match,
        event_type: MatchEventType,
        team: Option<Team>,
        player: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            match_id: m.id.clone(),
            event_type,
            minute: m.minute,
            team,
            player,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_match() -> Match {
        Match::new(Team::new("Arsenal", "ARS"), Team::new("Chelsea", "CHE"))
    }

    #[test]
    fn test_status_order_follows_lifecycle() {
        let mut status = MatchStatus::NotStarted;
        let mut seen = vec![status];
        while let Some(next) = status.next() {
            assert!(next > status);
            status = next;
            seen.push(status);
        }
        assert_eq!(seen.len(), 5);
        assert_eq!(status, MatchStatus::FullTime);
    }

    #[test]
    fn test_live_statuses() {
        assert!(MatchStatus::HalfTime.is_live());
        assert!(!MatchStatus::NotStarted.is_live());
        assert!(!MatchStatus::FullTime.is_live());
    }

    #[test]
    fn test_match_json_carries_half_time_in_details() {
        let mut m = sample_match().with_status(MatchStatus::HalfTime).with_minute(45);
        m.half_time_start = Some(45);

        let json = serde_json::to_value(&m).unwrap();
        assert_eq!(json["status"], "HALF_TIME");
        assert_eq!(json["details"]["halfTimeStart"], 45);
        assert_eq!(json["homeTeam"]["shortCode"], "ARS");

        let parsed: Match = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.half_time_start, Some(45));
    }

    #[test]
    fn test_match_json_without_details() {
        let mut json = serde_json::to_value(sample_match()).unwrap();
        json.as_object_mut().unwrap().remove("details");
        let parsed: Match = serde_json::from_value(json.clone()).unwrap();
        assert_eq!(parsed.half_time_start, None);

        json["details"] = serde_json::Value::Null;
        let parsed: Match = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.half_time_start, None);
    }

    #[test]
    fn test_event_copies_match_minute() {
        let m = sample_match().with_status(MatchStatus::FirstHalf).with_minute(17);
        let event = MatchEvent::record(&m, MatchEventType::Foul, Some(m.away_team.clone()), None);
        assert_eq!(event.minute, 17);
        assert_eq!(event.match_id, m.id);

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "FOUL");
        assert_eq!(json["matchId"], m.id.as_str());
    }

    #[test]
    fn test_side_of_unknown_team() {
        let m = sample_match();
        assert_eq!(m.side_of(&m.home_team.id), Some(Side::Home));
        assert_eq!(m.side_of(&m.away_team.id), Some(Side::Away));
        assert_eq!(m.side_of("someone-else"), None);
    }
}
