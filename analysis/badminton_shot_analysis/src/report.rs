use anyhow::Result;
use std::io::Write;

use crate::analysis::{HeatmapCell, PlayerReport};
use crate::types::ShotType;

/// Writes one CSV row per player report.
pub fn write_stats_csv<W: Write>(writer: W, reports: &[PlayerReport]) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);

    let mut header = vec![
        "player_id".to_string(),
        "name".to_string(),
        "affiliation".to_string(),
        "total_shots".to_string(),
        "cross_rate".to_string(),
        "miss_rate".to_string(),
        "point_rate".to_string(),
        "rear_rate".to_string(),
        "mid_rate".to_string(),
        "front_rate".to_string(),
        "rear_cross_rate".to_string(),
    ];
    header.extend(ShotType::ALL.iter().map(|t| t.label().to_lowercase().replace(' ', "_")));
    wtr.write_record(&header)?;

    for report in reports {
        let stats = &report.stats;
        let mut row = vec![
            report.player.id.clone(),
            report.player.name.clone(),
            report.player.affiliation.clone(),
            stats.total_shots.to_string(),
            format!("{:.1}", stats.cross_rate),
            format!("{:.1}", stats.miss_rate),
            format!("{:.1}", stats.point_rate),
            format!("{:.1}", stats.rear_rate),
            format!("{:.1}", stats.mid_rate),
            format!("{:.1}", stats.front_rate),
            format!("{:.1}", report.rear_cross_rate),
        ];
        row.extend(
            ShotType::ALL
                .iter()
                .map(|t| report.shot_types.get(t).copied().unwrap_or(0).to_string()),
        );
        wtr.write_record(&row)?;
    }

    wtr.flush()?;
    Ok(())
}

/// Lays the heatmap out as the court grid, rear row on top.
pub fn render_heatmap(cells: &[HeatmapCell]) -> String {
    let mut output = String::new();
    for row in cells.chunks(3) {
        let line: Vec<String> = row
            .iter()
            .map(|cell| format!("{} {:>3} ({:>5.1}%)", cell.area, cell.error_count, cell.intensity))
            .collect();
        output.push_str(&line.join(" | "));
        output.push('\n');
    }
    output
}
