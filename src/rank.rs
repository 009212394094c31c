//! Performance points and recommendation ranking.

use serde::Serialize;

use crate::calibrate::CalibrationTable;
use crate::chart::{ChartIndex, ChartRecord};
use crate::clear::{ClearType, Lamp, next_goal};
use crate::db::models::PlayRecord;
use crate::model::clear_probability;

/// Constants that turn a level-scale value into points and fold the list
/// into a single rating.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PpParams {
    pub offset: f64,
    pub scale: f64,
    pub decay: f64,
    pub top_n: usize,
}

impl Default for PpParams {
    fn default() -> Self {
        Self {
            offset: 2.0,
            scale: 40.0,
            decay: 0.97,
            top_n: 100,
        }
    }
}

impl PpParams {
    /// `(level + offset) * scale`
    pub fn pp_for_level(&self, level: f64) -> f64 {
        (level + self.offset) * self.scale
    }
}

/// One cleared chart in the ranked list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub title: String,
    pub display_level: String,
    /// The threshold the player cleared (easy or hard).
    pub achieved_beta: f64,
    /// `achieved_beta` on the display level scale.
    pub level_value: f64,
    pub pp: f64,
    pub clear: ClearType,
    /// Fine lamp of the play, for display and filtering.
    pub lamp: Lamp,
}

/// Score every easy or hard clear, sort by pp descending and keep the top N.
/// Ties keep the order of `plays`.
pub fn rank_plays(
    plays: &[PlayRecord],
    index: &ChartIndex<'_>,
    calibration: &CalibrationTable,
    params: &PpParams,
) -> Vec<Recommendation> {
    let mut ranked: Vec<Recommendation> = plays
        .iter()
        .filter_map(|play| {
            let chart = index.get(&play.sha256)?;
            let clear = ClearType::from_grade(play.clear);
            let achieved_beta = match clear {
                ClearType::NoPlay | ClearType::Failed => return None,
                ClearType::Easy => chart.beta_easy,
                ClearType::Hard => chart.beta_hard,
            };
            let level_value = calibration.latent_to_level(achieved_beta);
            Some(Recommendation {
                title: chart.title.clone(),
                display_level: chart.display_level.clone(),
                achieved_beta,
                level_value,
                pp: params.pp_for_level(level_value),
                clear,
                lamp: Lamp::from_grade(play.clear),
            })
        })
        .collect();

    ranked.sort_by(|a, b| b.pp.total_cmp(&a.pp));
    ranked.truncate(params.top_n);
    ranked
}

/// Aggregate of the ranked list.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PerformanceRating {
    /// Sum with the k-th best entry weighted by `decay^k`.
    pub decayed: f64,
    /// Plain sum.
    pub raw: f64,
}

/// Fold a pp list sorted descending, from the lowest entry up, multiplying
/// the running total by `decay` before adding each higher entry.
pub fn performance_rating(ranked: &[Recommendation], decay: f64) -> PerformanceRating {
    let decayed = ranked
        .iter()
        .rev()
        .fold(0.0, |total, entry| total * decay + entry.pp);
    let raw: f64 = ranked.iter().map(|entry| entry.pp).sum();
    PerformanceRating { decayed, raw }
}

/// One row of the full difficulty table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartRow {
    pub title: String,
    pub display_level: String,
    pub level: usize,
    /// Level-scale value of the next threshold to chase.
    pub difficulty: f64,
    pub lamp: Lamp,
    pub min_bp: Option<i32>,
    pub score_rate: Option<f64>,
    pub next_goal: Option<ClearType>,
    /// Chance of reaching `next_goal` at the estimated skill; 1 when done.
    pub pass_probability: f64,
}

/// Every chart in the category, joined with the player's best play on it.
/// Charts shadowed by a later duplicate in `index` are left out. Rows are
/// ordered by level, then difficulty.
pub fn difficulty_rows(
    charts: &[ChartRecord],
    index: &ChartIndex<'_>,
    plays: &[PlayRecord],
    prefix: &str,
    calibration: &CalibrationTable,
    theta: f64,
) -> Vec<ChartRow> {
    let by_sha256: std::collections::HashMap<&str, &PlayRecord> =
        plays.iter().map(|p| (p.sha256.as_str(), p)).collect();

    let mut rows: Vec<ChartRow> = charts
        .iter()
        .filter(|chart| index.get(&chart.sha256).is_some_and(|c| std::ptr::eq(c, *chart)))
        .filter_map(|chart| {
            let level = chart.level().filter(|dl| dl.prefix == prefix)?.level;
            let play = by_sha256.get(chart.sha256.as_str());
            let grade = play.map_or(0, |p| p.clear);
            let goal = next_goal(grade);
            let target_beta = match goal {
                Some(ClearType::Easy) => chart.beta_easy,
                _ => chart.beta_hard,
            };
            let pass_probability = if goal.is_some() {
                clear_probability(theta, target_beta, chart.alpha)
            } else {
                1.0
            };
            Some(ChartRow {
                title: chart.title.clone(),
                display_level: chart.display_level.clone(),
                level,
                difficulty: calibration.latent_to_level(target_beta),
                lamp: Lamp::from_grade(grade),
                min_bp: play.map(|p| p.min_bp),
                score_rate: play.map(|p| p.score_rate),
                next_goal: goal,
                pass_probability,
            })
        })
        .collect();

    rows.sort_by(|a, b| a.level.cmp(&b.level).then(a.difficulty.total_cmp(&b.difficulty)));
    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(pp: f64) -> Recommendation {
        Recommendation {
            title: format!("{pp}"),
            display_level: "sl1".into(),
            achieved_beta: 0.0,
            level_value: 0.0,
            pp,
            clear: ClearType::Easy,
            lamp: Lamp::Easy,
        }
    }

    fn chart(sha256: &str, level: &str, beta_easy: f64, beta_hard: f64) -> ChartRecord {
        ChartRecord {
            title: sha256.to_uppercase(),
            display_level: level.into(),
            md5: String::new(),
            sha256: sha256.into(),
            beta_easy,
            beta_hard,
            alpha: 1.0,
        }
    }

    fn play(sha256: &str, clear: i32) -> PlayRecord {
        PlayRecord {
            sha256: sha256.into(),
            clear,
            min_bp: 10,
            score_rate: 0.85,
        }
    }

    #[test]
    fn test_rating_example() {
        let ranked = vec![entry(800.0), entry(600.0)];
        let rating = performance_rating(&ranked, 0.97);
        assert!((rating.decayed - 1382.0).abs() < 1e-9);
        assert!((rating.raw - 1400.0).abs() < 1e-9);
    }

    #[test]
    fn test_rating_matches_weighted_sum() {
        let ranked = vec![entry(500.0), entry(400.0), entry(300.0), entry(100.0)];
        let rating = performance_rating(&ranked, 0.9);
        let expected: f64 = ranked
            .iter()
            .enumerate()
            .map(|(k, e)| e.pp * 0.9_f64.powi(k as i32))
            .sum();
        assert!((rating.decayed - expected).abs() < 1e-9);
        assert_eq!(performance_rating(&[], 0.97).decayed, 0.0);
    }

    #[test]
    fn test_pp_formula() {
        let params = PpParams::default();
        assert_eq!(params.pp_for_level(0.0), 80.0);
        assert_eq!(params.pp_for_level(10.5), 500.0);
    }

    #[test]
    fn test_rank_plays() {
        let charts = vec![
            chart("a", "sl0", 10.0, 11.0),
            chart("b", "sl1", 12.0, 13.0),
            chart("c", "sl2", 14.0, 15.0),
        ];
        let index = ChartIndex::new(&charts);
        let calibration = CalibrationTable::new(vec![10.0, 12.0, 14.0]).unwrap();
        let plays = vec![
            play("a", 6),       // hard: beta 11 -> level 0.5
            play("b", 4),       // easy: beta 12 -> level 1
            play("c", 1),       // failed: skipped
            play("zzz", 7),     // unknown chart
        ];
        let ranked = rank_plays(&plays, &index, &calibration, &PpParams::default());
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].title, "B");
        assert_eq!(ranked[0].clear, ClearType::Easy);
        assert_eq!(ranked[0].lamp, Lamp::Easy);
        assert_eq!(ranked[0].pp, 120.0);
        assert_eq!(ranked[1].title, "A");
        assert_eq!(ranked[1].achieved_beta, 11.0);
        assert_eq!(ranked[1].pp, 100.0);
        assert_eq!(ranked[1].clear, ClearType::Hard);
        assert_eq!(ranked[1].lamp, Lamp::Hard);
    }

    #[test]
    fn test_rank_truncates() {
        let charts: Vec<ChartRecord> = (0..5)
            .map(|i| chart(&format!("c{i}"), "sl0", i as f64, i as f64 + 1.0))
            .collect();
        let index = ChartIndex::new(&charts);
        let calibration = CalibrationTable::new(vec![0.0, 1.0]).unwrap();
        let plays: Vec<PlayRecord> = (0..5).map(|i| play(&format!("c{i}"), 4)).collect();
        let params = PpParams { top_n: 3, ..PpParams::default() };
        let ranked = rank_plays(&plays, &index, &calibration, &params);
        assert_eq!(ranked.len(), 3);
        assert_eq!(ranked[0].title, "C4");
        assert!(ranked.windows(2).all(|w| w[0].pp >= w[1].pp));
    }

    #[test]
    fn test_difficulty_rows() {
        let charts = vec![
            chart("a", "sl0", 10.0, 11.0),
            chart("b", "sl1", 12.0, 13.0),
            chart("c", "sl1", 11.5, 12.5),
            chart("x", "st0", 0.0, 1.0),
        ];
        let calibration = CalibrationTable::new(vec![10.0, 12.0]).unwrap();
        let plays = vec![play("a", 7), play("b", 5)];
        let index = ChartIndex::new(&charts);
        let rows = difficulty_rows(&charts, &index, &plays, "sl", &calibration, 12.0);
        assert_eq!(rows.len(), 3);

        assert_eq!(rows[0].title, "A");
        assert_eq!(rows[0].lamp, Lamp::ExHard);
        assert_eq!(rows[0].next_goal, None);
        assert_eq!(rows[0].pass_probability, 1.0);

        // level 1 rows sorted by difficulty: unplayed C (easy 11.5) before B (hard 13)
        assert_eq!(rows[1].title, "C");
        assert_eq!(rows[1].lamp, Lamp::NoPlay);
        assert_eq!(rows[1].next_goal, Some(ClearType::Easy));
        assert_eq!(rows[1].min_bp, None);
        assert_eq!(rows[1].difficulty, 0.75);

        assert_eq!(rows[2].title, "B");
        assert_eq!(rows[2].next_goal, Some(ClearType::Hard));
        assert_eq!(rows[2].difficulty, 1.5);
        assert!((rows[2].pass_probability - clear_probability(12.0, 13.0, 1.0)).abs() < 1e-12);
        assert_eq!(rows[2].score_rate, Some(0.85));
    }
}
