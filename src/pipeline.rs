//! One full run: calibrate, fit, rank.

use anyhow::{Context, Result};
use serde::Serialize;

use crate::calibrate::CalibrationTable;
use crate::chart::{ChartIndex, ChartRecord};
use crate::db::models::PlayRecord;
use crate::estimate::{Estimate, SearchOptions, estimate_skill};
use crate::model::observations;
use crate::rank::{
    ChartRow, PerformanceRating, PpParams, Recommendation, difficulty_rows, performance_rating,
    rank_plays,
};

/// Inputs that are not data.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Display level category, e.g. `sl`.
    pub prefix: String,
    pub search: SearchOptions,
    pub pp: PpParams,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            prefix: "sl".to_string(),
            search: SearchOptions::default(),
            pp: PpParams::default(),
        }
    }
}

/// Everything a report needs.
#[derive(Debug, Clone, Serialize)]
pub struct Outcome {
    pub prefix: String,
    pub calibration: CalibrationTable,
    pub estimate: Estimate,
    /// `estimate.theta` on the display level scale.
    pub level: f64,
    pub recommendations: Vec<Recommendation>,
    pub rating: PerformanceRating,
    #[serde(skip)]
    pub charts: Vec<ChartRow>,
}

/// Charts whose display level belongs to `prefix`.
fn category_charts(charts: &[ChartRecord], prefix: &str) -> Vec<ChartRecord> {
    charts
        .iter()
        .filter(|c| c.level().is_some_and(|dl| dl.prefix == prefix))
        .cloned()
        .collect()
}

/// Fit only: calibration plus estimate.
pub fn fit(
    charts: &[ChartRecord],
    plays: &[PlayRecord],
    settings: &Settings,
) -> Result<(CalibrationTable, Estimate)> {
    let in_category = category_charts(charts, &settings.prefix);
    let index = ChartIndex::new(&in_category);
    fit_indexed(charts, &index, plays, settings)
}

fn fit_indexed(
    charts: &[ChartRecord],
    index: &ChartIndex<'_>,
    plays: &[PlayRecord],
    settings: &Settings,
) -> Result<(CalibrationTable, Estimate)> {
    let calibration = CalibrationTable::from_charts(charts, &settings.prefix)
        .with_context(|| format!("Calibration failed for \"{}\"", settings.prefix))?;
    let observed = observations(plays, index);
    let estimate = estimate_skill(&observed, &settings.search).context("Skill estimation failed")?;
    Ok((calibration, estimate))
}

/// Full run. Fails without partial output if calibration or the fit fails.
pub fn run(charts: &[ChartRecord], plays: &[PlayRecord], settings: &Settings) -> Result<Outcome> {
    let in_category = category_charts(charts, &settings.prefix);
    let index = ChartIndex::new(&in_category);

    let (calibration, estimate) = fit_indexed(charts, &index, plays, settings)?;
    let level = calibration.latent_to_level(estimate.theta);

    let recommendations = rank_plays(plays, &index, &calibration, &settings.pp);
    let rating = performance_rating(&recommendations, settings.pp.decay);
    let rows = difficulty_rows(
        &in_category,
        &index,
        plays,
        &settings.prefix,
        &calibration,
        estimate.theta,
    );

    log::info!(
        "Estimated {}{:.2}, {} recommendations, rating {:.1}",
        settings.prefix,
        level,
        recommendations.len(),
        rating.decayed
    );

    Ok(Outcome {
        prefix: settings.prefix.clone(),
        calibration,
        estimate,
        level,
        recommendations,
        rating,
        charts: rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibrate::CalibrationError;
    use crate::estimate::EstimationError;

    fn chart(sha256: &str, level: &str, beta_easy: f64, beta_hard: f64) -> ChartRecord {
        ChartRecord {
            title: sha256.to_string(),
            display_level: level.into(),
            md5: String::new(),
            sha256: sha256.into(),
            beta_easy,
            beta_hard,
            alpha: 1.2,
        }
    }

    fn play(sha256: &str, clear: i32) -> PlayRecord {
        PlayRecord {
            sha256: sha256.into(),
            clear,
            min_bp: 5,
            score_rate: 0.9,
        }
    }

    fn sample_charts() -> Vec<ChartRecord> {
        vec![
            chart("a0", "sl0", -4.0, -3.0),
            chart("b0", "sl0", -3.0, -2.0),
            chart("a1", "sl1", -1.0, 0.0),
            chart("b1", "sl1", -0.5, 0.5),
            chart("a2", "sl2", 2.0, 3.0),
            chart("b2", "sl2", 2.5, 3.5),
        ]
    }

    #[test]
    fn test_full_run() {
        let charts = sample_charts();
        let plays = vec![
            play("a0", 7),
            play("b0", 6),
            play("a1", 5),
            play("b1", 4),
            play("a2", 1),
            play("b2", 0),
            play("unknown", 6),
        ];
        let out = run(&charts, &plays, &Settings::default()).unwrap();

        assert_eq!(out.calibration.anchors(), &[-3.5, -0.75, 2.25]);
        // hard on level 0, easy on level 1, failed on level 2
        assert!(out.estimate.theta > -3.0 && out.estimate.theta < 2.0);
        assert!(out.level > 0.0 && out.level < 2.0);
        assert_eq!(out.recommendations.len(), 4);
        assert!(out.recommendations.windows(2).all(|w| w[0].pp >= w[1].pp));
        assert_eq!(out.charts.len(), 6);
        assert_eq!(out.estimate.observations, 5);

        let exhard = out.recommendations.iter().find(|r| r.title == "a0").unwrap();
        assert_eq!(exhard.clear, crate::clear::ClearType::Hard);
        assert_eq!(exhard.lamp, crate::clear::Lamp::ExHard);
    }

    #[test]
    fn test_calibration_gap_aborts() {
        let charts = vec![chart("a0", "sl0", 0.0, 1.0), chart("a2", "sl2", 2.0, 3.0)];
        let err = run(&charts, &[play("a0", 6)], &Settings::default()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CalibrationError>(),
            Some(CalibrationError::EmptyLevel { level: 1, .. })
        ));
    }

    #[test]
    fn test_no_plays_aborts() {
        let err = run(&sample_charts(), &[], &Settings::default()).unwrap_err();
        assert_eq!(
            err.downcast_ref::<EstimationError>(),
            Some(&EstimationError::NoObservations)
        );
    }

    #[test]
    fn test_other_category_not_fitted() {
        let mut charts = sample_charts();
        charts.push(chart("st", "st3", 50.0, 60.0));
        let plays = [play("a1", 6), play("st", 1)];
        let (_, estimate) = fit(&charts, &plays, &Settings::default()).unwrap();
        assert_eq!(estimate.observations, 1);

        let out = run(&charts, &plays, &Settings::default()).unwrap();
        assert_eq!(out.recommendations.len(), 1);
        assert_eq!(out.charts.len(), 6);
    }
}
