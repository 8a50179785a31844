use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteConnectOptions;
use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::warn;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoreConfig {
    pub database_url: String,
    /// Database file opened as-is, bypassing URL parsing. Wins over `database_url`.
    pub database_path: Option<PathBuf>,
    pub max_connections: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://badminton_analysis.db".to_string(),
            database_path: None,
            max_connections: 1,
        }
    }
}

fn parse_max_connections(value: &str) -> Option<u32> {
    match value.parse::<u32>() {
        Ok(max) if max > 0 => Some(max),
        _ => {
            warn!("Ignoring invalid SHOT_DB_MAX_CONNECTIONS value {:?}", value);
            None
        }
    }
}

impl StoreConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(url) = env::var("SHOT_DB_URL") {
            config.database_url = url;
        }
        if let Some(max) = env::var("SHOT_DB_MAX_CONNECTIONS")
            .ok()
            .and_then(|value| parse_max_connections(&value))
        {
            config.max_connections = max;
        }

        config
    }

    /// Config for a database file at `path`.
    pub fn for_path(path: &Path) -> Self {
        Self {
            database_url: format!("sqlite://{}", path.display()),
            database_path: Some(path.to_path_buf()),
            ..Self::default()
        }
    }

    /// Where the store lives, for log lines.
    pub fn location(&self) -> String {
        match &self.database_path {
            Some(path) => path.display().to_string(),
            None => self.database_url.clone(),
        }
    }

    pub fn connect_options(&self) -> Result<SqliteConnectOptions, sqlx::Error> {
        let options = match &self.database_path {
            Some(path) => SqliteConnectOptions::new().filename(path),
            None => SqliteConnectOptions::from_str(&self.database_url)?,
        };
        Ok(options.create_if_missing(true))
    }

    pub fn is_in_memory(&self) -> bool {
        self.database_path.is_none()
            && (self.database_url.contains(":memory:") || self.database_url.contains("mode=memory"))
    }
}
