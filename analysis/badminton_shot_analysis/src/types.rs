use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};

use crate::error::ValidationError;

pub type PlayerId = String;
pub type MatchId = String;
pub type ShotId = String;

static LAST_ID: AtomicI64 = AtomicI64::new(0);

/// Current wall clock in epoch milliseconds.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Returns a new record id based on the millisecond clock.
///
/// Ids are strictly increasing within the process, so two records created in
/// the same millisecond still get distinct ids.
pub fn next_id() -> String {
    let now = now_millis();
    let mut last = LAST_ID.load(Ordering::Relaxed);
    loop {
        let candidate = if now > last { now } else { last + 1 };
        match LAST_ID.compare_exchange_weak(last, candidate, Ordering::SeqCst, Ordering::Relaxed) {
            Ok(_) => return candidate.to_string(),
            Err(current) => last = current,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub affiliation: String,
}

impl Player {
    pub fn new(name: impl Into<String>, affiliation: impl Into<String>) -> Self {
        Self {
            id: next_id(),
            name: name.into(),
            affiliation: affiliation.into(),
        }
    }

    /// Name as shown in match listings, e.g. "Kento (Tokyo BC)"
    pub fn display_name(&self) -> String {
        format!("{} ({})", self.name, self.affiliation)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchType {
    Singles,
    Doubles,
}

impl fmt::Display for MatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchType::Singles => write!(f, "singles"),
            MatchType::Doubles => write!(f, "doubles"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchPlayers {
    pub player1: PlayerId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player2: Option<PlayerId>,
    pub opponent1: PlayerId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opponent2: Option<PlayerId>,
}

impl MatchPlayers {
    /// Our side, ignoring an absent second player.
    pub fn own_side(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.player1.as_str()).chain(self.player2.as_deref())
    }

    pub fn opposing_side(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.opponent1.as_str()).chain(self.opponent2.as_deref())
    }

    pub fn all(&self) -> impl Iterator<Item = &str> {
        self.own_side().chain(self.opposing_side())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Match {
    pub id: MatchId,
    pub date: NaiveDate,
    #[serde(rename = "type")]
    pub match_type: MatchType,
    pub players: MatchPlayers,
    pub created_at: i64,
}

impl Match {
    pub fn singles(date: NaiveDate, player1: &str, opponent1: &str) -> Self {
        Self {
            id: next_id(),
            date,
            match_type: MatchType::Singles,
            players: MatchPlayers {
                player1: player1.to_string(),
                player2: None,
                opponent1: opponent1.to_string(),
                opponent2: None,
            },
            created_at: now_millis(),
        }
    }

    pub fn doubles(date: NaiveDate, own: (&str, &str), opponents: (&str, &str)) -> Self {
        Self {
            id: next_id(),
            date,
            match_type: MatchType::Doubles,
            players: MatchPlayers {
                player1: own.0.to_string(),
                player2: Some(own.1.to_string()),
                opponent1: opponents.0.to_string(),
                opponent2: Some(opponents.1.to_string()),
            },
            created_at: now_millis(),
        }
    }

    /// True if the player occupies any of the four slots.
    pub fn involves(&self, player_id: &str) -> bool {
        self.players.all().any(|id| id == player_id)
    }

    /// Checks the match against the registered players.
    ///
    /// Reports the first problem found; nothing is corrected.
    pub fn validate(&self, players: &[Player]) -> Result<(), ValidationError> {
        let p = &self.players;
        match self.match_type {
            MatchType::Doubles => {
                if p.player2.is_none() || p.opponent2.is_none() {
                    return Err(ValidationError::MissingDoublesPartner {
                        match_id: self.id.clone(),
                    });
                }
            }
            MatchType::Singles => {
                if p.player2.is_some() || p.opponent2.is_some() {
                    return Err(ValidationError::UnexpectedSinglesPartner {
                        match_id: self.id.clone(),
                    });
                }
            }
        }

        for id in p.all() {
            if !players.iter().any(|player| player.id == id) {
                return Err(ValidationError::UnknownPlayer {
                    match_id: self.id.clone(),
                    player_id: id.to_string(),
                });
            }
        }

        if let Some(id) = p.own_side().find(|id| p.opposing_side().any(|other| other == *id)) {
            return Err(ValidationError::PlayerOnBothSides {
                match_id: self.id.clone(),
                player_id: id.to_string(),
            });
        }

        if p.player2.as_deref() == Some(p.player1.as_str())
            || p.opponent2.as_deref() == Some(p.opponent1.as_str())
        {
            return Err(ValidationError::DuplicatePartner {
                match_id: self.id.clone(),
            });
        }

        Ok(())
    }
}

/// Row of the 3x3 court grid, counted from the back line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CourtDepth {
    Rear,
    Mid,
    Front,
}

/// Column of the 3x3 court grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CourtSide {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CourtZone {
    LR,
    CR,
    RR,
    LM,
    CM,
    RM,
    LF,
    CF,
    RF,
}

impl CourtZone {
    /// Grid order: rear row first, left to right.
    pub const ALL: [CourtZone; 9] = [
        CourtZone::LR,
        CourtZone::CR,
        CourtZone::RR,
        CourtZone::LM,
        CourtZone::CM,
        CourtZone::RM,
        CourtZone::LF,
        CourtZone::CF,
        CourtZone::RF,
    ];

    pub fn depth(self) -> CourtDepth {
        match self {
            CourtZone::LR | CourtZone::CR | CourtZone::RR => CourtDepth::Rear,
            CourtZone::LM | CourtZone::CM | CourtZone::RM => CourtDepth::Mid,
            CourtZone::LF | CourtZone::CF | CourtZone::RF => CourtDepth::Front,
        }
    }

    pub fn side(self) -> CourtSide {
        match self {
            CourtZone::LR | CourtZone::LM | CourtZone::LF => CourtSide::Left,
            CourtZone::CR | CourtZone::CM | CourtZone::CF => CourtSide::Center,
            CourtZone::RR | CourtZone::RM | CourtZone::RF => CourtSide::Right,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            CourtZone::LR => "LR",
            CourtZone::CR => "CR",
            CourtZone::RR => "RR",
            CourtZone::LM => "LM",
            CourtZone::CM => "CM",
            CourtZone::RM => "RM",
            CourtZone::LF => "LF",
            CourtZone::CF => "CF",
            CourtZone::RF => "RF",
        }
    }
}

impl fmt::Display for CourtZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShotType {
    ShortServe,
    LongServe,
    Clear,
    Smash,
    Drop,
    LongReturn,
    ShortReturn,
    Drive,
    Lob,
    Push,
    Hairpin,
}

impl ShotType {
    pub const ALL: [ShotType; 11] = [
        ShotType::ShortServe,
        ShotType::LongServe,
        ShotType::Clear,
        ShotType::Smash,
        ShotType::Drop,
        ShotType::LongReturn,
        ShotType::ShortReturn,
        ShotType::Drive,
        ShotType::Lob,
        ShotType::Push,
        ShotType::Hairpin,
    ];

    /// Legend label for the shot type distribution.
    pub fn label(self) -> &'static str {
        match self {
            ShotType::ShortServe => "Short serve",
            ShotType::LongServe => "Long serve",
            ShotType::Clear => "Clear",
            ShotType::Smash => "Smash",
            ShotType::Drop => "Drop",
            ShotType::LongReturn => "Long return",
            ShotType::ShortReturn => "Short return",
            ShotType::Drive => "Drive",
            ShotType::Lob => "Lob",
            ShotType::Push => "Push",
            ShotType::Hairpin => "Hairpin",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShotResult {
    Point,
    Miss,
    Winner,
    Error,
    Continue,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shot {
    pub id: ShotId,
    pub match_id: MatchId,
    pub timestamp: i64,
    pub hit_player: PlayerId,
    pub receive_player: PlayerId,
    pub hit_area: CourtZone,
    pub receive_area: CourtZone,
    pub shot_type: ShotType,
    pub is_cross: bool,
    pub result: ShotResult,
}

/// A rally event as entered, before it is given an id and timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewShot {
    pub match_id: MatchId,
    pub hit_player: PlayerId,
    pub receive_player: PlayerId,
    pub hit_area: CourtZone,
    pub receive_area: CourtZone,
    pub shot_type: ShotType,
    pub is_cross: bool,
    pub result: ShotResult,
}

impl Shot {
    pub fn record(new: NewShot) -> Self {
        Self {
            id: next_id(),
            match_id: new.match_id,
            timestamp: now_millis(),
            hit_player: new.hit_player,
            receive_player: new.receive_player,
            hit_area: new.hit_area,
            receive_area: new.receive_area,
            shot_type: new.shot_type,
            is_cross: new.is_cross,
            result: new.result,
        }
    }

    pub fn involves(&self, player_id: &str) -> bool {
        self.hit_player == player_id || self.receive_player == player_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player(id: &str) -> Player {
        Player {
            id: id.to_string(),
            name: format!("Player {}", id),
            affiliation: "Club".to_string(),
        }
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 12).unwrap()
    }

    #[test]
    fn test_next_id_is_unique() {
        let ids: Vec<String> = (0..100).map(|_| next_id()).collect();
        let mut numeric: Vec<i64> = ids.iter().map(|id| id.parse().unwrap()).collect();
        let sorted = numeric.clone();
        numeric.dedup();
        assert_eq!(numeric.len(), 100);
        assert!(sorted.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_display_name() {
        let p = Player::new("Kento", "Tokyo BC");
        assert_eq!(p.display_name(), "Kento (Tokyo BC)");
    }

    #[test]
    fn test_match_json_shape() {
        let m = Match {
            id: "10".to_string(),
            date: date(),
            match_type: MatchType::Singles,
            players: MatchPlayers {
                player1: "1".to_string(),
                player2: None,
                opponent1: "2".to_string(),
                opponent2: None,
            },
            created_at: 1_700_000_000_000,
        };
        let json = serde_json::to_value(&m).unwrap();
        assert_eq!(json["type"], "singles");
        assert_eq!(json["date"], "2024-05-12");
        assert_eq!(json["createdAt"], 1_700_000_000_000i64);
        assert!(json["players"].get("player2").is_none());
        // display text matches the stored tag
        assert_eq!(m.match_type.to_string(), "singles");
        assert_eq!(MatchType::Doubles.to_string(), "doubles");
    }

    #[test]
    fn test_shot_json_shape() {
        let json = r#"{
            "id": "1", "matchId": "m", "timestamp": 5,
            "hitPlayer": "1", "receivePlayer": "2",
            "hitArea": "LR", "receiveArea": "RF",
            "shotType": "short_return", "isCross": true, "result": "continue"
        }"#;
        let shot: Shot = serde_json::from_str(json).unwrap();
        assert_eq!(shot.hit_area, CourtZone::LR);
        assert_eq!(shot.shot_type, ShotType::ShortReturn);
        assert_eq!(shot.result, ShotResult::Continue);
    }

    #[test]
    fn test_zone_grid() {
        assert_eq!(CourtZone::CR.depth(), CourtDepth::Rear);
        assert_eq!(CourtZone::RM.side(), CourtSide::Right);
        assert_eq!(CourtZone::LF.depth(), CourtDepth::Front);
        assert_eq!(CourtZone::ALL.iter().filter(|z| z.depth() == CourtDepth::Mid).count(), 3);
    }

    #[test]
    fn test_validate_singles_and_doubles() {
        let players = vec![player("1"), player("2"), player("3"), player("4")];

        assert!(Match::singles(date(), "1", "2").validate(&players).is_ok());
        assert!(Match::doubles(date(), ("1", "2"), ("3", "4")).validate(&players).is_ok());

        let mut missing = Match::doubles(date(), ("1", "2"), ("3", "4"));
        missing.players.opponent2 = None;
        assert!(matches!(
            missing.validate(&players),
            Err(ValidationError::MissingDoublesPartner { .. })
        ));

        let mut extra = Match::singles(date(), "1", "2");
        extra.players.player2 = Some("3".to_string());
        assert!(matches!(
            extra.validate(&players),
            Err(ValidationError::UnexpectedSinglesPartner { .. })
        ));
    }

    #[test]
    fn test_validate_references() {
        let players = vec![player("1"), player("2"), player("3")];

        assert!(matches!(
            Match::singles(date(), "1", "9").validate(&players),
            Err(ValidationError::UnknownPlayer { player_id, .. }) if player_id == "9"
        ));
        assert!(matches!(
            Match::doubles(date(), ("1", "2"), ("2", "3")).validate(&players),
            Err(ValidationError::PlayerOnBothSides { player_id, .. }) if player_id == "2"
        ));
        assert!(matches!(
            Match::doubles(date(), ("1", "1"), ("2", "3")).validate(&players),
            Err(ValidationError::DuplicatePartner { .. })
        ));
    }
}
