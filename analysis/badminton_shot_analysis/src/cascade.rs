//! Referential cleanup for deletions.
//!
//! These functions only rewrite the in-memory collections. The caller persists
//! the result, normally through [`crate::store::RecordStore::replace_all`].
//! Unknown ids are not an error; the collections come back unchanged.

use crate::types::{Match, Player, Shot};

/// Removes a player together with every match and shot that references them.
pub fn delete_player(
    player_id: &str,
    players: Vec<Player>,
    matches: Vec<Match>,
    shots: Vec<Shot>,
) -> (Vec<Player>, Vec<Match>, Vec<Shot>) {
    let players = players.into_iter().filter(|p| p.id != player_id).collect();
    let matches = matches.into_iter().filter(|m| !m.involves(player_id)).collect();
    let shots = shots.into_iter().filter(|s| !s.involves(player_id)).collect();
    (players, matches, shots)
}

/// Removes a match and the shots recorded for it.
pub fn delete_match(match_id: &str, matches: Vec<Match>, shots: Vec<Shot>) -> (Vec<Match>, Vec<Shot>) {
    let matches = matches.into_iter().filter(|m| m.id != match_id).collect();
    let shots = shots.into_iter().filter(|s| s.match_id != match_id).collect();
    (matches, shots)
}

/// Drops the most recently appended shot. Position decides, not timestamp.
pub fn delete_last_shot(mut shots: Vec<Shot>) -> Vec<Shot> {
    shots.pop();
    shots
}
