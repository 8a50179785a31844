//! Durable storage for players, matches and shots.
//!
//! Each collection is one SQLite table holding the JSON form of its records,
//! keyed by record id. The `seq` column remembers the order in which ids were
//! first written, which is the order `get_all` returns.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sqlx::sqlite::{SqliteConnection, SqlitePool, SqlitePoolOptions};
use std::collections::HashSet;
use std::fmt;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::cascade;
use crate::config::StoreConfig;
use crate::error::{Error, Result};
use crate::types::{Match, Player, Shot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Players,
    Matches,
    Shots,
}

impl Collection {
    pub const ALL: [Collection; 3] = [Collection::Players, Collection::Matches, Collection::Shots];

    pub fn table(self) -> &'static str {
        match self {
            Collection::Players => "players",
            Collection::Matches => "matches",
            Collection::Shots => "shots",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table())
    }
}

/// A record that lives in one of the store's collections.
pub trait Record: Serialize + DeserializeOwned + Send + Sync {
    const COLLECTION: Collection;

    fn id(&self) -> &str;
}

impl Record for Player {
    const COLLECTION: Collection = Collection::Players;

    fn id(&self) -> &str {
        &self.id
    }
}

impl Record for Match {
    const COLLECTION: Collection = Collection::Matches;

    fn id(&self) -> &str {
        &self.id
    }
}

impl Record for Shot {
    const COLLECTION: Collection = Collection::Shots;

    fn id(&self) -> &str {
        &self.id
    }
}

/// The backup document: every collection, in full.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExportDocument {
    pub players: Vec<Player>,
    pub matches: Vec<Match>,
    pub shots: Vec<Shot>,
}

impl ExportDocument {
    /// Parses a backup. Fails if a section or a required record field is missing.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// SHA-256 of the compact JSON encoding, as lowercase hex.
    pub fn checksum(&self) -> Result<String> {
        let mut hasher = Sha256::new();
        hasher.update(serde_json::to_vec(self)?);
        Ok(format!("{:x}", hasher.finalize()))
    }
}

struct Encoded {
    id: String,
    data: String,
}

fn encode<R: Record>(records: &[R]) -> Result<Vec<Encoded>> {
    records
        .iter()
        .map(|record| -> Result<Encoded> {
            Ok(Encoded {
                id: record.id().to_string(),
                data: serde_json::to_string(record)?,
            })
        })
        .collect()
}

async fn upsert_in(conn: &mut SqliteConnection, collection: Collection, rows: &[Encoded]) -> Result<()> {
    let sql = format!(
        "INSERT INTO {} (id, data) VALUES (?, ?) ON CONFLICT(id) DO UPDATE SET data = excluded.data",
        collection.table()
    );
    for row in rows {
        sqlx::query(&sql)
            .bind(&row.id)
            .bind(&row.data)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

async fn replace_in(conn: &mut SqliteConnection, collection: Collection, rows: &[Encoded]) -> Result<()> {
    let keep: HashSet<&str> = rows.iter().map(|row| row.id.as_str()).collect();
    let existing: Vec<String> = sqlx::query_scalar(&format!("SELECT id FROM {}", collection.table()))
        .fetch_all(&mut *conn)
        .await?;

    let delete_sql = format!("DELETE FROM {} WHERE id = ?", collection.table());
    let mut removed = 0;
    for id in existing.iter().filter(|id| !keep.contains(id.as_str())) {
        sqlx::query(&delete_sql).bind(id).execute(&mut *conn).await?;
        removed += 1;
    }
    debug!("Removed {} records from {}", removed, collection);

    upsert_in(conn, collection, rows).await
}

/// Handle to the record store.
///
/// The database is opened on first use. Every call acquires its own
/// connection, and mutating calls run inside a single transaction, so a
/// failed batch leaves the stored data as it was. The store does not
/// serialize concurrent writers; callers issue one mutation at a time.
#[derive(Debug)]
pub struct RecordStore {
    config: StoreConfig,
    pool: OnceCell<SqlitePool>,
}

impl RecordStore {
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config,
            pool: OnceCell::new(),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Opens the database and creates missing tables. Calling it again is a no-op.
    pub async fn init(&self) -> Result<&SqlitePool> {
        self.pool
            .get_or_try_init(|| async {
                info!("Opening record store at {}", self.config.location());
                let options = self.config.connect_options()?;

                let mut pool_options = SqlitePoolOptions::new().max_connections(self.config.max_connections);
                if self.config.is_in_memory() {
                    // an in-memory database lives only as long as its connection
                    pool_options = pool_options.max_connections(1).idle_timeout(None).max_lifetime(None);
                }
                let pool = pool_options.connect_with(options).await?;

                for collection in Collection::ALL {
                    sqlx::query(&format!(
                        "CREATE TABLE IF NOT EXISTS {} (
                            seq INTEGER PRIMARY KEY AUTOINCREMENT,
                            id TEXT NOT NULL UNIQUE,
                            data TEXT NOT NULL
                        )",
                        collection.table()
                    ))
                    .execute(&pool)
                    .await?;
                }

                Ok::<_, Error>(pool)
            })
            .await
    }

    /// Upserts every record by id. Either all records are written or none.
    pub async fn put_all<R: Record>(&self, records: &[R]) -> Result<()> {
        let rows = encode(records)?;
        let pool = self.init().await?;

        let mut tx = pool.begin().await?;
        upsert_in(&mut *tx, R::COLLECTION, &rows).await?;
        tx.commit().await?;

        debug!("Saved {} records to {}", rows.len(), R::COLLECTION);
        Ok(())
    }

    /// All stored records in the order their ids were first written.
    pub async fn get_all<R: Record>(&self) -> Result<Vec<R>> {
        let pool = self.init().await?;
        let rows: Vec<String> = sqlx::query_scalar(&format!("SELECT data FROM {} ORDER BY seq", R::COLLECTION.table()))
            .fetch_all(pool)
            .await?;

        rows.iter()
            .map(|data| serde_json::from_str(data).map_err(Error::from))
            .collect()
    }

    /// Makes the stored collection hold exactly `records`.
    ///
    /// Records that stay keep their position.
    pub async fn replace_all<R: Record>(&self, records: &[R]) -> Result<()> {
        let rows = encode(records)?;
        let pool = self.init().await?;

        let mut tx = pool.begin().await?;
        replace_in(&mut *tx, R::COLLECTION, &rows).await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn export_all(&self) -> Result<ExportDocument> {
        Ok(ExportDocument {
            players: self.get_all().await?,
            matches: self.get_all().await?,
            shots: self.get_all().await?,
        })
    }

    /// Upserts all three collections from a backup in one transaction.
    pub async fn import_all(&self, document: &ExportDocument) -> Result<()> {
        let players = encode(&document.players)?;
        let matches = encode(&document.matches)?;
        let shots = encode(&document.shots)?;
        let pool = self.init().await?;

        let mut tx = pool.begin().await?;
        upsert_in(&mut *tx, Collection::Players, &players).await?;
        upsert_in(&mut *tx, Collection::Matches, &matches).await?;
        upsert_in(&mut *tx, Collection::Shots, &shots).await?;
        tx.commit().await?;

        info!(
            "Imported {} players, {} matches, {} shots",
            players.len(),
            matches.len(),
            shots.len()
        );
        Ok(())
    }

    pub async fn export_json(&self) -> Result<String> {
        let document = self.export_all().await?;
        info!("Exporting backup (sha256 {})", document.checksum()?);
        document.to_json()
    }

    /// Parses and imports a backup. A malformed document changes nothing.
    pub async fn import_json(&self, text: &str) -> Result<()> {
        let document = ExportDocument::from_json(text)?;
        info!("Importing backup (sha256 {})", document.checksum()?);
        self.import_all(&document).await
    }

    /// Deletes a player with their matches and shots, and persists the result.
    pub async fn apply_player_deletion(&self, player_id: &str) -> Result<()> {
        let (players, matches, shots) = cascade::delete_player(
            player_id,
            self.get_all().await?,
            self.get_all().await?,
            self.get_all().await?,
        );
        let players = encode(&players)?;
        let matches = encode(&matches)?;
        let shots = encode(&shots)?;

        let pool = self.init().await?;
        let mut tx = pool.begin().await?;
        replace_in(&mut *tx, Collection::Players, &players).await?;
        replace_in(&mut *tx, Collection::Matches, &matches).await?;
        replace_in(&mut *tx, Collection::Shots, &shots).await?;
        tx.commit().await?;

        info!("Deleted player {}", player_id);
        Ok(())
    }

    /// Deletes a match and its shots, and persists the result.
    pub async fn apply_match_deletion(&self, match_id: &str) -> Result<()> {
        let (matches, shots) = cascade::delete_match(match_id, self.get_all().await?, self.get_all().await?);
        let matches = encode(&matches)?;
        let shots = encode(&shots)?;

        let pool = self.init().await?;
        let mut tx = pool.begin().await?;
        replace_in(&mut *tx, Collection::Matches, &matches).await?;
        replace_in(&mut *tx, Collection::Shots, &shots).await?;
        tx.commit().await?;

        info!("Deleted match {}", match_id);
        Ok(())
    }

    /// Removes the most recently recorded shot, if any.
    pub async fn undo_last_shot(&self) -> Result<Option<Shot>> {
        let mut shots: Vec<Shot> = self.get_all().await?;
        let last = shots.last().cloned();
        shots = cascade::delete_last_shot(shots);
        self.replace_all(&shots).await?;

        if let Some(shot) = &last {
            info!("Removed last shot {} of match {}", shot.id, shot.match_id);
        }
        Ok(last)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CourtZone, ShotResult, ShotType};
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn temp_store() -> (TempDir, RecordStore) {
        let dir = TempDir::new().unwrap();
        let store = RecordStore::new(StoreConfig::for_path(&dir.path().join("shots.db")));
        (dir, store)
    }

    fn player(id: &str, name: &str) -> Player {
        Player {
            id: id.to_string(),
            name: name.to_string(),
            affiliation: "Club".to_string(),
        }
    }

    fn shot(id: &str, match_id: &str) -> Shot {
        Shot {
            id: id.to_string(),
            match_id: match_id.to_string(),
            timestamp: 1,
            hit_player: "1".to_string(),
            receive_player: "2".to_string(),
            hit_area: CourtZone::LR,
            receive_area: CourtZone::RF,
            shot_type: ShotType::Smash,
            is_cross: true,
            result: ShotResult::Point,
        }
    }

    #[tokio::test]
    async fn test_init_is_idempotent() {
        let (_dir, store) = temp_store();
        let first = store.init().await.unwrap() as *const SqlitePool;
        let second = store.init().await.unwrap() as *const SqlitePool;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_empty_collection() {
        let (_dir, store) = temp_store();
        let players: Vec<Player> = store.get_all().await.unwrap();
        assert!(players.is_empty());
    }

    #[tokio::test]
    async fn test_put_all_upserts_and_keeps_first_write_order() {
        let (_dir, store) = temp_store();
        store.put_all(&[player("b", "Bea"), player("a", "Ann")]).await.unwrap();
        store.put_all(&[player("a", "Ann Renamed"), player("c", "Cal")]).await.unwrap();
        store.put_all(&[player("a", "Ann Renamed")]).await.unwrap();

        let players: Vec<Player> = store.get_all().await.unwrap();
        assert_eq!(
            players,
            vec![player("b", "Bea"), player("a", "Ann Renamed"), player("c", "Cal")]
        );
    }

    #[tokio::test]
    async fn test_replace_all_removes_missing_ids() {
        let (_dir, store) = temp_store();
        store.put_all(&[shot("1", "m"), shot("2", "m"), shot("3", "m")]).await.unwrap();
        store.replace_all(&[shot("1", "m"), shot("3", "m")]).await.unwrap();

        let ids: Vec<String> = store.get_all::<Shot>().await.unwrap().into_iter().map(|s| s.id).collect();
        assert_eq!(ids, vec!["1", "3"]);
    }

    #[tokio::test]
    async fn test_malformed_import_leaves_store_untouched() {
        let (_dir, store) = temp_store();
        store.put_all(&[player("1", "Ann")]).await.unwrap();

        let missing_section = r#"{ "players": [], "matches": [] }"#;
        assert!(matches!(store.import_json(missing_section).await, Err(Error::Format(_))));

        let missing_field = r#"{ "players": [{ "id": "2", "name": "Bo" }], "matches": [], "shots": [] }"#;
        assert!(matches!(store.import_json(missing_field).await, Err(Error::Format(_))));

        let players: Vec<Player> = store.get_all().await.unwrap();
        assert_eq!(players, vec![player("1", "Ann")]);
    }

    async fn install_trigger(store: &RecordStore, sql: &str) {
        sqlx::query(sql).execute(store.init().await.unwrap()).await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_put_all_writes_nothing() {
        let (_dir, store) = temp_store();
        store.put_all(&[player("keep", "Kim")]).await.unwrap();
        install_trigger(
            &store,
            "CREATE TRIGGER reject_bad BEFORE INSERT ON players WHEN NEW.id = 'bad'
             BEGIN SELECT RAISE(ABORT, 'rejected'); END",
        )
        .await;

        let result = store
            .put_all(&[player("keep", "Kim Renamed"), player("good", "Gus"), player("bad", "Bad")])
            .await;
        assert!(matches!(result, Err(Error::Storage(_))));

        let players: Vec<Player> = store.get_all().await.unwrap();
        assert_eq!(players, vec![player("keep", "Kim")]);
    }

    #[tokio::test]
    async fn test_failed_replace_all_writes_nothing() {
        let (_dir, store) = temp_store();
        store.put_all(&[shot("1", "m"), shot("2", "m")]).await.unwrap();
        install_trigger(
            &store,
            "CREATE TRIGGER reject_bad BEFORE INSERT ON shots WHEN NEW.id = 'bad'
             BEGIN SELECT RAISE(ABORT, 'rejected'); END",
        )
        .await;

        let result = store.replace_all(&[shot("1", "m"), shot("bad", "m")]).await;
        assert!(matches!(result, Err(Error::Storage(_))));

        let ids: Vec<String> = store.get_all::<Shot>().await.unwrap().into_iter().map(|s| s.id).collect();
        assert_eq!(ids, vec!["1", "2"]);
    }

    #[tokio::test]
    async fn test_failed_player_deletion_keeps_every_collection() {
        let (_dir, store) = temp_store();
        let players = vec![player("1", "Ann"), player("2", "Bo")];
        let matches = vec![Match::singles(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(), "1", "2")];
        let shots = vec![shot("s1", &matches[0].id), shot("s2", &matches[0].id)];
        store.put_all(&players).await.unwrap();
        store.put_all(&matches).await.unwrap();
        store.put_all(&shots).await.unwrap();

        // players and matches are rewritten before shots, so the abort comes last
        install_trigger(
            &store,
            "CREATE TRIGGER keep_shots BEFORE DELETE ON shots
             BEGIN SELECT RAISE(ABORT, 'shots are locked'); END",
        )
        .await;

        let result = store.apply_player_deletion("1").await;
        assert!(matches!(result, Err(Error::Storage(_))));

        assert_eq!(store.get_all::<Player>().await.unwrap(), players);
        assert_eq!(store.get_all::<Match>().await.unwrap(), matches);
        assert_eq!(store.get_all::<Shot>().await.unwrap(), shots);
    }

    #[tokio::test]
    async fn test_file_name_with_url_characters() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("club?season=1#a.db");
        let store = RecordStore::new(StoreConfig::for_path(&path));
        store.put_all(&[player("1", "Ann")]).await.unwrap();

        assert!(path.exists());
        let reopened = RecordStore::new(StoreConfig::for_path(&path));
        assert_eq!(reopened.get_all::<Player>().await.unwrap(), vec![player("1", "Ann")]);
    }

    #[test]
    fn test_document_sections() {
        let document = ExportDocument {
            players: vec![player("1", "Ann")],
            matches: vec![Match::singles(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(), "1", "2")],
            shots: vec![shot("s", "m")],
        };
        let value: serde_json::Value = serde_json::from_str(&document.to_json().unwrap()).unwrap();
        let mut keys: Vec<&String> = value.as_object().unwrap().keys().collect();
        keys.sort();
        assert_eq!(keys, vec!["matches", "players", "shots"]);
        assert_eq!(document.checksum().unwrap().len(), 64);
    }
}
