//! Maximum-likelihood skill estimation.
//!
//! The objective is one-dimensional and cheap, so a derivative-free bounded
//! Brent search (golden section with parabolic steps) is enough.

use serde::Serialize;
use thiserror::Error;

use crate::model::{Observation, negative_log_likelihood};

/// Default search interval on the latent scale.
pub const DEFAULT_BOUNDS: (f64, f64) = (-20.0, 10.0);
/// Default absolute tolerance on theta.
pub const DEFAULT_XATOL: f64 = 1e-5;
/// Default cap on objective evaluations.
pub const DEFAULT_MAX_EVALS: usize = 500;

const GOLDEN: f64 = 0.381_966_011_250_105_1; // (3 - sqrt 5) / 2

#[derive(Error, Debug, PartialEq)]
pub enum EstimationError {
    #[error("no cleared or failed plays on known charts to fit")]
    NoObservations,
    #[error("invalid search bounds [{0}, {1}]")]
    InvalidBounds(f64, f64),
    #[error("optimizer did not converge: {0}")]
    NotConverged(String),
}

pub type Result<T> = std::result::Result<T, EstimationError>;

/// Optimizer settings.
#[derive(Debug, Clone, Copy)]
pub struct SearchOptions {
    pub lower: f64,
    pub upper: f64,
    pub xatol: f64,
    pub max_evals: usize,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            lower: DEFAULT_BOUNDS.0,
            upper: DEFAULT_BOUNDS.1,
            xatol: DEFAULT_XATOL,
            max_evals: DEFAULT_MAX_EVALS,
        }
    }
}

/// Result of a converged search.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Minimum {
    pub x: f64,
    pub value: f64,
    pub evaluations: usize,
}

/// Minimize `f` on `[lower, upper]` with Brent's bounded method.
pub fn minimize_bounded<F>(mut f: F, opts: &SearchOptions) -> Result<Minimum>
where
    F: FnMut(f64) -> f64,
{
    let (mut a, mut b) = (opts.lower, opts.upper);
    if !a.is_finite() || !b.is_finite() || a > b {
        return Err(EstimationError::InvalidBounds(a, b));
    }
    let sqrt_eps = f64::EPSILON.sqrt();

    // x: best point, w: second best, v: previous w
    let mut x = a + GOLDEN * (b - a);
    let (mut w, mut v) = (x, x);
    let mut fx = f(x);
    let (mut fw, mut fv) = (fx, fx);
    let mut fu = f64::INFINITY;
    let mut evaluations = 1;

    let mut step = 0.0_f64;
    let mut prev_step = 0.0_f64;
    let mut mid = 0.5 * (a + b);
    let mut tol1 = sqrt_eps * x.abs() + opts.xatol / 3.0;
    let mut tol2 = 2.0 * tol1;
    let mut exhausted = false;

    while (x - mid).abs() > tol2 - 0.5 * (b - a) {
        let mut golden = true;

        if prev_step.abs() > tol1 {
            golden = false;
            let r = (x - w) * (fx - fv);
            let mut q = (x - v) * (fx - fw);
            let mut p = (x - v) * q - (x - w) * r;
            q = 2.0 * (q - r);
            if q > 0.0 {
                p = -p;
            }
            q = q.abs();
            let older = prev_step;
            prev_step = step;

            if p.abs() < (0.5 * q * older).abs() && p > q * (a - x) && p < q * (b - x) {
                step = p / q;
                let u = x + step;
                if (u - a) < tol2 || (b - u) < tol2 {
                    step = tol1 * sign_or_one(mid - x);
                }
            } else {
                golden = true;
            }
        }

        if golden {
            prev_step = if x >= mid { a - x } else { b - x };
            step = GOLDEN * prev_step;
        }

        let u = x + sign_or_one(step) * step.abs().max(tol1);
        fu = f(u);
        evaluations += 1;

        if fu <= fx {
            if u >= x {
                a = x;
            } else {
                b = x;
            }
            (v, fv) = (w, fw);
            (w, fw) = (x, fx);
            (x, fx) = (u, fu);
        } else {
            if u < x {
                a = u;
            } else {
                b = u;
            }
            if fu <= fw || w == x {
                (v, fv) = (w, fw);
                (w, fw) = (u, fu);
            } else if fu <= fv || v == x || v == w {
                (v, fv) = (u, fu);
            }
        }

        mid = 0.5 * (a + b);
        tol1 = sqrt_eps * x.abs() + opts.xatol / 3.0;
        tol2 = 2.0 * tol1;

        if evaluations >= opts.max_evals {
            exhausted = true;
            break;
        }
    }

    if x.is_nan() || fx.is_nan() || fu.is_nan() {
        return Err(EstimationError::NotConverged(
            "objective returned NaN".to_string(),
        ));
    }
    if exhausted {
        return Err(EstimationError::NotConverged(format!(
            "maximum number of function evaluations ({}) reached",
            opts.max_evals
        )));
    }

    Ok(Minimum {
        x,
        value: fx,
        evaluations,
    })
}

fn sign_or_one(v: f64) -> f64 {
    if v < 0.0 { -1.0 } else { 1.0 }
}

/// Fitted skill.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Estimate {
    /// Skill on the latent scale.
    pub theta: f64,
    /// Negative log-likelihood at `theta`.
    pub nll: f64,
    pub evaluations: usize,
    /// Number of plays that entered the likelihood.
    pub observations: usize,
}

/// Fit the skill that best explains the observed clears.
pub fn estimate_skill(observations: &[Observation], opts: &SearchOptions) -> Result<Estimate> {
    if observations.is_empty() {
        return Err(EstimationError::NoObservations);
    }

    let min = minimize_bounded(|theta| negative_log_likelihood(theta, observations), opts)?;
    log::info!(
        "Estimated theta = {:.4} (nll {:.3}, {} evaluations, {} plays)",
        min.x,
        min.value,
        min.evaluations,
        observations.len()
    );

    Ok(Estimate {
        theta: min.x,
        nll: min.value,
        evaluations: min.evaluations,
        observations: observations.len(),
    })
}
