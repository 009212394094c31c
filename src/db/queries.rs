use super::models::{PlayRecord, ScoreRow};
use super::{Database, Result, merge_attempts};

impl Database {
    /// Every attempt in the `score` table, unmerged.
    pub fn load_attempts(&self) -> Result<Vec<ScoreRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT sha256, clear, minbp, epg, lpg, egr, lgr, notes
             FROM score",
        )?;

        let rows = stmt
            .query_map([], |row| {
                Ok(ScoreRow {
                    sha256: row.get::<_, String>(0)?.to_lowercase(),
                    clear: row.get(1)?,
                    minbp: row.get(2)?,
                    epg: row.get(3)?,
                    lpg: row.get(4)?,
                    egr: row.get(5)?,
                    lgr: row.get(6)?,
                    notes: row.get(7)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    /// One merged record per chart.
    pub fn load_plays(&self) -> Result<Vec<PlayRecord>> {
        let attempts = self.load_attempts()?;
        let plays = merge_attempts(&attempts);
        log::info!(
            "Loaded {} attempts covering {} charts",
            attempts.len(),
            plays.len()
        );
        Ok(plays)
    }
}
