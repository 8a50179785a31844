use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use std::{fs, path::PathBuf};
use tracing::info;

use badminton_shot_analysis::{
    analysis::{compute_all_player_stats, compute_player_stats, generate_error_heatmap, shots_for_match},
    config::StoreConfig,
    report::{render_heatmap, write_stats_csv},
    types::{Match, Player, Shot},
    RecordStore,
};

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Database URL, overrides SHOT_DB_URL
    #[arg(long, global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Write every player, match and shot to a JSON backup
    Export {
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Load a JSON backup into the store
    Import {
        #[arg(short, long)]
        file: PathBuf,
    },
    /// Print shot statistics
    Stats {
        /// Only this player
        #[arg(short, long)]
        player: Option<String>,

        /// Only shots from this match
        #[arg(short, long)]
        match_id: Option<String>,
    },
    /// Print the error heatmap of a player
    Heatmap {
        #[arg(short, long)]
        player: String,
    },
    /// Write per-player statistics as CSV
    Report {
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Delete a player with their matches and shots
    DeletePlayer { id: String },
    /// Delete a match with its shots
    DeleteMatch { id: String },
    /// Remove the most recently recorded shot
    UndoShot,
}

async fn load(store: &RecordStore) -> Result<(Vec<Player>, Vec<Match>, Vec<Shot>)> {
    Ok((store.get_all().await?, store.get_all().await?, store.get_all().await?))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let mut config = StoreConfig::from_env();
    if let Some(url) = cli.database_url {
        config.database_url = url;
    }
    let store = RecordStore::new(config);
    info!("Using record store at {}", store.config().location());

    match cli.command {
        Commands::Export { output } => {
            let json = store.export_json().await?;
            fs::write(&output, json).with_context(|| format!("Failed to write {:?}", output))?;
            info!("Wrote backup to {:?}", output);
        }
        Commands::Import { file } => {
            let json = fs::read_to_string(&file).with_context(|| format!("Failed to read {:?}", file))?;
            store.import_json(&json).await?;
        }
        Commands::Stats { player, match_id } => {
            let (players, matches, shots) = load(&store).await?;
            let shots = match &match_id {
                Some(id) => {
                    let m = matches
                        .iter()
                        .find(|m| &m.id == id)
                        .with_context(|| format!("No match with id {}", id))?;
                    println!("{} match on {}\n", m.match_type, m.date);
                    shots_for_match(id, &shots)
                }
                None => shots,
            };

            for p in players.iter().filter(|p| player.as_deref().map_or(true, |id| id == p.id)) {
                println!("{}", p.display_name());
                println!("{}", compute_player_stats(&p.id, &shots).summary());
            }
        }
        Commands::Heatmap { player } => {
            let shots: Vec<Shot> = store.get_all().await?;
            print!("{}", render_heatmap(&generate_error_heatmap(&player, &shots)));
        }
        Commands::Report { output } => {
            let (players, _, shots) = load(&store).await?;
            let reports = compute_all_player_stats(&players, &shots);
            let file = fs::File::create(&output).with_context(|| format!("Failed to create {:?}", output))?;
            write_stats_csv(file, &reports)?;
            info!("Wrote {} player rows to {:?}", reports.len(), output);
        }
        Commands::DeletePlayer { id } => store.apply_player_deletion(&id).await?,
        Commands::DeleteMatch { id } => store.apply_match_deletion(&id).await?,
        Commands::UndoShot => match store.undo_last_shot().await? {
            Some(shot) => println!("Removed shot {}", shot.id),
            None => println!("No shots recorded"),
        },
    }

    Ok(())
}
