use serde::Serialize;

/// One row of the `score` table as stored by the player's client.
#[derive(Debug, Clone)]
pub struct ScoreRow {
    pub sha256: String,
    pub clear: i32,
    pub minbp: i32,
    pub epg: i64,
    pub lpg: i64,
    pub egr: i64,
    pub lgr: i64,
    pub notes: i64,
}

impl ScoreRow {
    /// EX score: two points per great-or-better, one per good.
    pub fn ex_score(&self) -> i64 {
        (self.epg + self.lpg) * 2 + self.egr + self.lgr
    }

    /// EX score over the maximum for the chart, in `[0, 1]`.
    pub fn score_rate(&self) -> f64 {
        if self.notes <= 0 {
            return 0.0;
        }
        (self.ex_score() as f64 / (self.notes * 2) as f64).clamp(0.0, 1.0)
    }
}

/// Best result on one chart after merging every attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayRecord {
    pub sha256: String,
    pub clear: i32,
    pub min_bp: i32,
    pub score_rate: f64,
}
