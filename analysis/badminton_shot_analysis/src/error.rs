use crate::types::{MatchId, PlayerId};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),
    #[error("Format error: {0}")]
    Format(#[from] serde_json::Error),
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Problems with a match record that callers must fix before saving it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("doubles match {match_id} needs player2 and opponent2")]
    MissingDoublesPartner { match_id: MatchId },
    #[error("singles match {match_id} must not have player2 or opponent2")]
    UnexpectedSinglesPartner { match_id: MatchId },
    #[error("match {match_id} references unknown player {player_id}")]
    UnknownPlayer { match_id: MatchId, player_id: PlayerId },
    #[error("player {player_id} is on both sides of match {match_id}")]
    PlayerOnBothSides { match_id: MatchId, player_id: PlayerId },
    #[error("match {match_id} lists the same partner twice")]
    DuplicatePartner { match_id: MatchId },
}
