//! Graded-response clear model.
//!
//! A chart has two thresholds on the latent scale, `beta_easy < beta_hard`,
//! sharing one slope `alpha`. For a player of skill `theta`:
//!
//! - P(fail)       = 1 - p(beta_easy)
//! - P(easy only)  = p(beta_easy) - p(beta_hard)
//! - P(hard)       = p(beta_hard)
//!
//! where `p(beta) = 1 / (1 + exp(-alpha * (theta - beta)))`.

use crate::chart::{ChartIndex, ChartRecord};
use crate::clear::ClearType;
use crate::db::models::PlayRecord;

/// Floor applied to every probability before taking the log.
pub const PROBABILITY_FLOOR: f64 = 1e-9;

/// Logistic probability of clearing a threshold `beta` with slope `alpha`.
pub fn clear_probability(theta: f64, beta: f64, alpha: f64) -> f64 {
    1.0 / (1.0 + (-alpha * (theta - beta)).exp())
}

/// A play joined with the parameters of its chart.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    pub beta_easy: f64,
    pub beta_hard: f64,
    pub alpha: f64,
    pub clear: ClearType,
}

impl Observation {
    pub fn new(chart: &ChartRecord, clear: ClearType) -> Self {
        Self {
            beta_easy: chart.beta_easy,
            beta_hard: chart.beta_hard,
            alpha: chart.alpha,
            clear,
        }
    }

    /// Probability of the observed category at `theta`. `None` for no-play,
    /// which carries no information.
    pub fn probability(&self, theta: f64) -> Option<f64> {
        let p1 = clear_probability(theta, self.beta_easy, self.alpha);
        let p2 = clear_probability(theta, self.beta_hard, self.alpha);
        match self.clear {
            ClearType::NoPlay => None,
            ClearType::Failed => Some(1.0 - p1),
            ClearType::Easy => Some(p1 - p2),
            ClearType::Hard => Some(p2),
        }
    }
}

/// Join plays to the reference table. Unplayed charts and plays on charts
/// missing from the table are left out.
pub fn observations(plays: &[PlayRecord], index: &ChartIndex<'_>) -> Vec<Observation> {
    let mut unknown = 0usize;
    let mut out = Vec::with_capacity(plays.len());

    for play in plays {
        let clear = ClearType::from_grade(play.clear);
        if clear == ClearType::NoPlay {
            continue;
        }
        match index.get(&play.sha256) {
            Some(chart) => out.push(Observation::new(chart, clear)),
            None => unknown += 1,
        }
    }

    if unknown > 0 {
        log::debug!("Skipped {unknown} plays on charts not in the reference table");
    }
    out
}

/// Negative log-likelihood of the observations at skill `theta`.
pub fn negative_log_likelihood(theta: f64, observations: &[Observation]) -> f64 {
    observations
        .iter()
        .filter_map(|obs| obs.probability(theta))
        .map(|p| -p.max(PROBABILITY_FLOOR).ln())
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(beta_easy: f64, beta_hard: f64, clear: ClearType) -> Observation {
        Observation {
            beta_easy,
            beta_hard,
            alpha: 1.5,
            clear,
        }
    }

    #[test]
    fn test_probability_midpoint() {
        assert_eq!(clear_probability(3.0, 3.0, 2.0), 0.5);
        assert_eq!(clear_probability(-7.0, -7.0, 0.1), 0.5);
    }

    #[test]
    fn test_probability_direction() {
        let low = clear_probability(0.0, 1.0, 1.0);
        let high = clear_probability(2.0, 1.0, 1.0);
        assert!(low < 0.5 && high > 0.5);
        // steeper slope sharpens the transition
        assert!(clear_probability(2.0, 1.0, 4.0) > high);
    }

    #[test]
    fn test_categories_sum_to_one() {
        let theta = 0.7;
        let total: f64 = [ClearType::Failed, ClearType::Easy, ClearType::Hard]
            .into_iter()
            .map(|c| obs(0.0, 1.5, c).probability(theta).unwrap())
            .sum();
        assert!((total - 1.0).abs() < 1e-12);
        assert_eq!(obs(0.0, 1.5, ClearType::NoPlay).probability(theta), None);
    }

    #[test]
    fn test_floor_keeps_nll_finite() {
        // identical thresholds: easy-only mass is exactly zero
        let history = [obs(1.0, 1.0, ClearType::Easy)];
        let nll = negative_log_likelihood(1.0, &history);
        assert!((nll - (-PROBABILITY_FLOOR.ln())).abs() < 1e-9);
    }

    #[test]
    fn test_nll_empty_is_zero() {
        assert_eq!(negative_log_likelihood(0.0, &[]), 0.0);
    }

    #[test]
    fn test_nll_prefers_consistent_skill() {
        let history = [
            obs(-2.0, -1.0, ClearType::Hard),
            obs(2.0, 3.0, ClearType::Failed),
        ];
        let near = negative_log_likelihood(0.0, &history);
        let far = negative_log_likelihood(6.0, &history);
        assert!(near < far);
    }

    #[test]
    fn test_observations_join() {
        let charts = vec![ChartRecord {
            title: "Known".into(),
            display_level: "sl1".into(),
            md5: String::new(),
            sha256: "known".into(),
            beta_easy: 0.0,
            beta_hard: 1.0,
            alpha: 2.0,
        }];
        let index = ChartIndex::new(&charts);
        let plays = vec![
            PlayRecord { sha256: "known".into(), clear: 5, min_bp: 10, score_rate: 0.8 },
            PlayRecord { sha256: "unknown".into(), clear: 6, min_bp: 0, score_rate: 0.9 },
            PlayRecord { sha256: "known".into(), clear: 0, min_bp: 0, score_rate: 0.0 },
        ];
        let joined = observations(&plays, &index);
        assert_eq!(joined.len(), 1);
        assert_eq!(joined[0].clear, ClearType::Easy);
        assert_eq!(joined[0].alpha, 2.0);
    }
}
