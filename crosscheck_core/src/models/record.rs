//! Entity records as harvested from the scrapers or the authoritative
//! source. Fields are kept as raw strings; the evaluator owns all
//! interpretation (units, formats, tolerances).

use super::rule::FieldType;
use crate::matching;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Player,
    Game,
}

/// An entity the matcher can align across two collections.
pub trait Reconcilable: Clone + Send + Sync {
    fn kind() -> EntityKind;

    /// Raw identity: display name for players, date string for games.
    fn identity(&self) -> &str;

    /// Normalized alignment key.
    fn match_key(&self) -> String;

    /// Field consulted for rule-assisted key matching. Games are keyed by
    /// the literal date string and have no rule field for their key.
    fn key_field() -> Option<FieldType>;

    /// Fields compared between aligned pairs.
    fn comparable_fields() -> &'static [FieldType];

    fn field(&self, field: FieldType) -> Option<&str>;
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerRecord {
    pub name: String,
    #[serde(default)]
    pub position: Option<String>,
    #[serde(default)]
    pub weight: Option<String>,
    #[serde(default)]
    pub height: Option<String>,
    #[serde(default)]
    pub year: Option<String>,
    #[serde(default)]
    pub eligibility: Option<String>,
    #[serde(default)]
    pub hometown: Option<String>,
    #[serde(default)]
    pub jersey: Option<String>,
}

impl PlayerRecord {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

const PLAYER_FIELDS: &[FieldType] = &[
    FieldType::Position,
    FieldType::Weight,
    FieldType::Height,
    FieldType::Year,
    FieldType::Eligibility,
    FieldType::Hometown,
    FieldType::Jersey,
];

impl Reconcilable for PlayerRecord {
    fn kind() -> EntityKind {
        EntityKind::Player
    }

    fn identity(&self) -> &str {
        &self.name
    }

    fn match_key(&self) -> String {
        matching::normalize_name(&self.name)
    }

    fn key_field() -> Option<FieldType> {
        Some(FieldType::Name)
    }

    fn comparable_fields() -> &'static [FieldType] {
        PLAYER_FIELDS
    }

    fn field(&self, field: FieldType) -> Option<&str> {
        match field {
            FieldType::Name => Some(&self.name),
            FieldType::Position => self.position.as_deref(),
            FieldType::Weight => self.weight.as_deref(),
            FieldType::Height => self.height.as_deref(),
            FieldType::Year => self.year.as_deref(),
            FieldType::Eligibility => self.eligibility.as_deref(),
            FieldType::Hometown => self.hometown.as_deref(),
            FieldType::Jersey => self.jersey.as_deref(),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameRecord {
    /// Schedule date as published by the source; also the alignment key.
    pub date: String,
    #[serde(default)]
    pub opponent: Option<String>,
    #[serde(default)]
    pub venue: Option<String>,
    #[serde(default)]
    pub tv: Option<String>,
    /// Home/away/neutral indicator.
    #[serde(default)]
    pub location_indicator: Option<String>,
    #[serde(default)]
    pub is_conference_game: Option<String>,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
}

impl GameRecord {
    pub fn on(date: impl Into<String>) -> Self {
        Self {
            date: date.into(),
            ..Default::default()
        }
    }
}

const GAME_FIELDS: &[FieldType] = &[
    FieldType::Opponent,
    FieldType::Venue,
    FieldType::Tv,
    FieldType::LocationIndicator,
    FieldType::IsConferenceGame,
    FieldType::Time,
    FieldType::Location,
];

impl Reconcilable for GameRecord {
    fn kind() -> EntityKind {
        EntityKind::Game
    }

    fn identity(&self) -> &str {
        &self.date
    }

    fn match_key(&self) -> String {
        matching::normalize_key(&self.date)
    }

    fn key_field() -> Option<FieldType> {
        None
    }

    fn comparable_fields() -> &'static [FieldType] {
        GAME_FIELDS
    }

    fn field(&self, field: FieldType) -> Option<&str> {
        match field {
            FieldType::Opponent => self.opponent.as_deref(),
            FieldType::Venue => self.venue.as_deref(),
            FieldType::Tv => self.tv.as_deref(),
            FieldType::LocationIndicator => self.location_indicator.as_deref(),
            FieldType::IsConferenceGame => self.is_conference_game.as_deref(),
            FieldType::Time => self.time.as_deref(),
            FieldType::Location => self.location.as_deref(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_player_key_strips_suffix() {
        let a = PlayerRecord::named("Bob  Smith Jr.");
        let b = PlayerRecord::named("bob smith");
        assert_eq!(a.match_key(), b.match_key());
    }

    #[test]
    fn test_game_key_is_literal_date() {
        let g = GameRecord::on(" 2026-01-10 ");
        assert_eq!(g.match_key(), "2026-01-10");
    }

    #[test]
    fn test_field_lookup() {
        let mut p = PlayerRecord::named("A");
        p.weight = Some("205".to_string());
        assert_eq!(p.field(FieldType::Weight), Some("205"));
        assert_eq!(p.field(FieldType::Venue), None);
    }
}
