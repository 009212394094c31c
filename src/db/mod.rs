pub mod models;
pub mod queries;

use rusqlite::{Connection, OpenFlags};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

use models::{PlayRecord, ScoreRow};

#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("score database not found: {0}")]
    NotFound(PathBuf),
}

pub type Result<T> = std::result::Result<T, DbError>;

/// Read-only handle on the player's score database.
pub struct Database {
    pub conn: Connection,
}

impl Database {
    /// Open an existing score database without write access. The file is
    /// never created: a missing path is an error.
    pub fn open(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(DbError::NotFound(path.to_path_buf()));
        }
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(Self { conn })
    }

    /// Wrap an already-open connection (in-memory fixtures in tests).
    pub fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }
}

/// Fold raw attempts into one record per chart. Each field is merged on its
/// own: best lamp, lowest miss count and highest rate may come from
/// different attempts. Output is ordered by sha256.
pub fn merge_attempts(rows: &[ScoreRow]) -> Vec<PlayRecord> {
    let mut merged: BTreeMap<&str, PlayRecord> = BTreeMap::new();

    for row in rows {
        let rate = row.score_rate();
        merged
            .entry(row.sha256.as_str())
            .and_modify(|play| {
                play.clear = play.clear.max(row.clear);
                play.min_bp = play.min_bp.min(row.minbp);
                play.score_rate = play.score_rate.max(rate);
            })
            .or_insert_with(|| PlayRecord {
                sha256: row.sha256.clone(),
                clear: row.clear,
                min_bp: row.minbp,
                score_rate: rate,
            });
    }

    merged.into_values().collect()
}
