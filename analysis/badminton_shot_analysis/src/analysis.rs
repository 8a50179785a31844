use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::{CourtDepth, CourtSide, CourtZone, Player, Shot, ShotResult, ShotType};

/// Rate-based statistics for the shots a player hit.
///
/// Every rate is a percentage in `0.0..=100.0`. The rates are independent:
/// cross, miss and point overlap freely, while rear, mid and front partition
/// the court and sum to 100 whenever at least one shot was hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerStats {
    pub total_shots: usize,
    pub cross_rate: f64,
    pub miss_rate: f64,
    pub point_rate: f64,
    pub rear_rate: f64,
    pub mid_rate: f64,
    pub front_rate: f64,
}

impl PlayerStats {
    pub fn summary(&self) -> String {
        let mut output = format!("Total shots: {}\n", self.total_shots);
        output.push_str(&format!("Cross rate: {:.1}%\n", self.cross_rate));
        output.push_str(&format!("Miss rate: {:.1}%\n", self.miss_rate));
        output.push_str(&format!("Point rate: {:.1}%\n", self.point_rate));
        output.push_str(&format!(
            "Court position: rear {:.1}% / mid {:.1}% / front {:.1}%\n",
            self.rear_rate, self.mid_rate, self.front_rate
        ));
        output
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeatmapCell {
    pub area: CourtZone,
    pub error_count: usize,
    pub intensity: f64,
}

/// Everything the analysis view shows for one player.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerReport {
    pub player: Player,
    pub stats: PlayerStats,
    pub shot_types: BTreeMap<ShotType, usize>,
    pub rear_cross_rate: f64,
}

/// `100 * part / whole`, or `0.0` when there is nothing to divide by.
fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 * 100.0 / whole as f64
    }
}

fn shots_hit_by<'a>(player_id: &'a str, shots: &'a [Shot]) -> impl Iterator<Item = &'a Shot> + 'a {
    shots.iter().filter(move |shot| shot.hit_player == player_id)
}

/// Shots recorded for one match, in recording order.
pub fn shots_for_match(match_id: &str, shots: &[Shot]) -> Vec<Shot> {
    shots
        .iter()
        .filter(|shot| shot.match_id == match_id)
        .cloned()
        .collect()
}

pub fn compute_player_stats(player_id: &str, shots: &[Shot]) -> PlayerStats {
    let player_shots: Vec<&Shot> = shots_hit_by(player_id, shots).collect();
    let total_shots = player_shots.len();

    let rate = |pred: fn(&Shot) -> bool| {
        percentage(player_shots.iter().filter(|shot| pred(**shot)).count(), total_shots)
    };

    PlayerStats {
        total_shots,
        cross_rate: rate(|shot| shot.is_cross),
        miss_rate: rate(|shot| shot.result == ShotResult::Miss),
        point_rate: rate(|shot| shot.result == ShotResult::Point),
        rear_rate: rate(|shot| shot.hit_area.depth() == CourtDepth::Rear),
        mid_rate: rate(|shot| shot.hit_area.depth() == CourtDepth::Mid),
        front_rate: rate(|shot| shot.hit_area.depth() == CourtDepth::Front),
    }
}

/// Counts per shot type. Types the player never hit are left out.
pub fn compute_shot_type_distribution(player_id: &str, shots: &[Shot]) -> BTreeMap<ShotType, usize> {
    let mut counts = BTreeMap::new();
    for shot in shots_hit_by(player_id, shots) {
        *counts.entry(shot.shot_type).or_insert(0) += 1;
    }
    counts
}

/// Error counts per hit zone, scaled against the zone with the most errors.
///
/// Always returns the nine zones in grid order.
pub fn generate_error_heatmap(player_id: &str, shots: &[Shot]) -> Vec<HeatmapCell> {
    let counts: Vec<(CourtZone, usize)> = CourtZone::ALL
        .iter()
        .map(|&zone| {
            let errors = shots_hit_by(player_id, shots)
                .filter(|shot| shot.hit_area == zone && shot.result == ShotResult::Error)
                .count();
            (zone, errors)
        })
        .collect();

    let max_errors = counts.iter().map(|(_, errors)| *errors).max().unwrap_or(0);

    counts
        .into_iter()
        .map(|(area, error_count)| HeatmapCell {
            area,
            error_count,
            intensity: percentage(error_count, max_errors),
        })
        .collect()
}

/// A shot from a rear corner into the opposite side's mid or front court.
fn is_rear_cross(shot: &Shot) -> bool {
    let opposite_sides = matches!(
        (shot.hit_area.side(), shot.receive_area.side()),
        (CourtSide::Left, CourtSide::Right) | (CourtSide::Right, CourtSide::Left)
    );
    opposite_sides && shot.hit_area.depth() == CourtDepth::Rear && shot.receive_area.depth() != CourtDepth::Rear
}

/// Cross rate among rear-court shots, judged from the hit and receive zones
/// rather than the recorded flag. Center-rear shots never count as cross.
pub fn compute_rear_cross_rate(player_id: &str, shots: &[Shot]) -> f64 {
    let rear: Vec<&Shot> = shots_hit_by(player_id, shots)
        .filter(|shot| shot.hit_area.depth() == CourtDepth::Rear)
        .collect();
    let cross = rear.iter().filter(|shot| is_rear_cross(shot)).count();
    percentage(cross, rear.len())
}

pub fn compute_all_player_stats(players: &[Player], shots: &[Shot]) -> Vec<PlayerReport> {
    players
        .iter()
        .map(|player| PlayerReport {
            player: player.clone(),
            stats: compute_player_stats(&player.id, shots),
            shot_types: compute_shot_type_distribution(&player.id, shots),
            rear_cross_rate: compute_rear_cross_rate(&player.id, shots),
        })
        .collect()
}
