//! Level calibration: anchor the latent difficulty scale to display levels.
//!
//! Each display level `i` within one category (e.g. `sl`) gets an anchor
//! equal to the mean `beta_easy` of its charts. Between anchors the mapping
//! is linear; outside them it extrapolates from the nearest edge segment:
//! `level = (value - anchor[i]) / (anchor[i+1] - anchor[i]) + i`.

use serde::Serialize;
use thiserror::Error;

use crate::chart::{ChartRecord, DisplayLevel};

#[derive(Error, Debug, PartialEq)]
pub enum CalibrationError {
    #[error("no charts with level prefix \"{0}\"")]
    NoCharts(String),
    #[error("level {prefix}{level} has no charts; levels must be contiguous from 0")]
    EmptyLevel { prefix: String, level: usize },
    #[error("display level {0:?} has no integer level")]
    BadLevel(String),
    #[error("need at least 2 calibration anchors, got {0}")]
    TooFewAnchors(usize),
    #[error("anchors not strictly increasing at level {level}: {lower} >= {upper}")]
    NotIncreasing { level: usize, lower: f64, upper: f64 },
}

pub type Result<T> = std::result::Result<T, CalibrationError>;

/// Per-level mean easy difficulty, strictly increasing by construction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalibrationTable {
    anchors: Vec<f64>,
}

impl CalibrationTable {
    /// Validate a sequence of anchors. Fails on fewer than two or on any
    /// non-increasing step.
    pub fn new(anchors: Vec<f64>) -> Result<Self> {
        if anchors.len() < 2 {
            return Err(CalibrationError::TooFewAnchors(anchors.len()));
        }
        for (level, pair) in anchors.windows(2).enumerate() {
            // negated so NaN also fails
            if !(pair[0] < pair[1]) {
                return Err(CalibrationError::NotIncreasing {
                    level,
                    lower: pair[0],
                    upper: pair[1],
                });
            }
        }
        Ok(Self { anchors })
    }

    /// Average `beta_easy` per level over charts whose display level has the
    /// given prefix. Levels run from 0 to the highest level present; a level
    /// with no charts is an error.
    pub fn from_charts(charts: &[ChartRecord], prefix: &str) -> Result<Self> {
        let mut sums: Vec<f64> = Vec::new();
        let mut counts: Vec<usize> = Vec::new();

        for chart in charts {
            if !chart.display_level.starts_with(prefix) {
                continue;
            }
            let level = match DisplayLevel::parse(&chart.display_level) {
                Some(dl) if dl.prefix == prefix => dl.level,
                Some(_) => continue,
                None => return Err(CalibrationError::BadLevel(chart.display_level.clone())),
            };
            if level >= counts.len() {
                counts.resize(level + 1, 0);
                sums.resize(level + 1, 0.0);
            }
            counts[level] += 1;
            sums[level] += chart.beta_easy;
        }

        if counts.is_empty() {
            return Err(CalibrationError::NoCharts(prefix.to_string()));
        }

        let mut anchors = Vec::with_capacity(counts.len());
        for (level, (&sum, &count)) in sums.iter().zip(&counts).enumerate() {
            if count == 0 {
                return Err(CalibrationError::EmptyLevel {
                    prefix: prefix.to_string(),
                    level,
                });
            }
            anchors.push(sum / count as f64);
        }

        log::debug!("Calibration anchors for {prefix}: {anchors:?}");
        Self::new(anchors)
    }

    pub fn anchors(&self) -> &[f64] {
        &self.anchors
    }

    /// Map a latent value (difficulty or skill) onto the display level scale.
    pub fn latent_to_level(&self, value: f64) -> f64 {
        let i = self.segment_for(value);
        let (lo, hi) = (self.anchors[i], self.anchors[i + 1]);
        (value - lo) / (hi - lo) + i as f64
    }

    /// Inverse of [`latent_to_level`](Self::latent_to_level).
    pub fn level_to_latent(&self, level: f64) -> f64 {
        let last = self.anchors.len() - 2;
        let i = if level <= 0.0 {
            0
        } else {
            (level.floor() as usize).min(last)
        };
        let (lo, hi) = (self.anchors[i], self.anchors[i + 1]);
        lo + (level - i as f64) * (hi - lo)
    }

    /// Greatest segment start `i < len - 1` with `anchor[i] <= value`, or 0.
    fn segment_for(&self, value: f64) -> usize {
        let last = self.anchors.len() - 1;
        self.anchors[..last]
            .iter()
            .rposition(|&a| a <= value)
            .unwrap_or(0)
    }
}
