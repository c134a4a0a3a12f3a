//! Derivation of distribution parameters from user-facing statistics.
//!
//! Users describe read lengths and identities with a mean, a standard
//! deviation and (for identities) a maximum. This module converts those into
//! the canonical shape parameters of the gamma and beta distributions. It
//! also computes N-values (e.g. the N50) of a gamma length distribution. Those
//! tail evaluations are done in log space so that very large shape parameters
//! (narrow length distributions) neither overflow nor lose all precision.

#![allow(clippy::excessive_precision)]

use crate::errors::SimulationError;

/// Relative precision targeted by the incomplete gamma evaluations.
const EPSILON: f64 = 1e-15;

/// Smallest magnitude allowed in the continued fraction before it is nudged
/// away from zero.
const TINY: f64 = 1e-300;

/// Iteration cap for the series and continued fraction.
const MAX_ITERATIONS: usize = 10_000_000;

/// Search tolerance used when bisecting for an N-value.
const N_VALUE_TOLERANCE: f64 = 0.01;

//===================//
// Special functions //
//===================//

// Lanczos approximation of ln(Γ(x)) for x > 0, as given in Numerical Recipes
// (gammln). Absolute error is below 2e-10.
const LANCZOS_COEFFICIENTS: [f64; 6] = [
    76.18009172947146,
    -86.50532032941677,
    24.01409824083091,
    -1.231739572450155,
    0.1208650973866179e-2,
    -0.5395239384953e-5,
];

/// Natural logarithm of the gamma function for `x > 0`.
pub fn ln_gamma(x: f64) -> f64 {
    let mut y = x;
    let tmp = x + 5.5;
    let tmp = tmp - (x + 0.5) * tmp.ln();
    let mut series = 1.000000000190015;
    for coefficient in LANCZOS_COEFFICIENTS {
        y += 1.0;
        series += coefficient / y;
    }
    -tmp + (2.5066282746310005 * series / x).ln()
}

/// `ln(x^a e^-x / Γ(a))`, the common prefix of both incomplete gamma
/// expansions.
fn ln_gamma_prefix(a: f64, x: f64) -> f64 {
    a * x.ln() - x - ln_gamma(a)
}

/// Regularized lower incomplete gamma function P(a, x) by its power series.
/// Converges quickly for `x < a + 1`.
fn lower_regularized_gamma_series(a: f64, x: f64) -> f64 {
    let mut ap = a;
    let mut term = 1.0 / a;
    let mut sum = term;

    for _ in 0..MAX_ITERATIONS {
        ap += 1.0;
        term *= x / ap;
        sum += term;
        if term.abs() < sum.abs() * EPSILON {
            break;
        }
    }

    (sum.ln() + ln_gamma_prefix(a, x)).exp()
}

/// `ln(Q(a, x))` via the modified Lentz continued fraction. Converges quickly
/// for `x >= a + 1`.
fn ln_upper_regularized_gamma_fraction(a: f64, x: f64) -> f64 {
    let mut b = x + 1.0 - a;
    let mut c = 1.0 / TINY;
    let mut d = 1.0 / b;
    let mut h = d;

    for i in 1..MAX_ITERATIONS {
        let an = -(i as f64) * (i as f64 - a);
        b += 2.0;
        d = an * d + b;
        if d.abs() < TINY {
            d = TINY;
        }
        c = b + an / c;
        if c.abs() < TINY {
            c = TINY;
        }
        d = 1.0 / d;
        let delta = d * c;
        h *= delta;
        if (delta - 1.0).abs() < EPSILON {
            break;
        }
    }

    h.ln() + ln_gamma_prefix(a, x)
}

/// Natural logarithm of the regularized upper incomplete gamma function,
/// `ln(Q(a, x)) = ln(1 - P(a, x))`, for `a > 0` and `x >= 0`. Returns
/// negative infinity when Q underflows.
pub fn ln_upper_regularized_gamma(a: f64, x: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }

    if x < a + 1.0 {
        (-lower_regularized_gamma_series(a, x)).ln_1p()
    } else {
        ln_upper_regularized_gamma_fraction(a, x)
    }
}

//=======//
// Gamma //
//=======//

/// Shape/scale parameters of a gamma distribution.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GammaParams {
    /// Shape parameter (k).
    pub shape: f64,

    /// Scale parameter (θ).
    pub scale: f64,
}

impl GammaParams {
    /// Derives the shape (`m²/s²`) and scale (`s²/m`) from a mean and
    /// standard deviation. Both must be positive: a zero standard deviation
    /// describes a constant, not a gamma distribution.
    pub fn from_mean_stdev(mean: f64, stdev: f64) -> Result<Self, SimulationError> {
        if !(mean > 0.0 && mean.is_finite()) {
            return Err(SimulationError::configuration(format!(
                "gamma mean must be positive, got {}",
                mean
            )));
        }

        if !(stdev > 0.0 && stdev.is_finite()) {
            return Err(SimulationError::configuration(format!(
                "gamma stdev must be positive, got {}",
                stdev
            )));
        }

        Ok(GammaParams {
            shape: mean.powi(2) / stdev.powi(2),
            scale: stdev.powi(2) / mean,
        })
    }

    /// The rate parameter (1/θ).
    pub fn rate(&self) -> f64 {
        1.0 / self.scale
    }

    /// Fraction of all bases that lie in fragments no longer than `x`. This is
    /// the CDF of the length-biased distribution, Gamma(k + 1, θ).
    pub fn base_weighted_cdf(&self, x: f64) -> f64 {
        -(ln_upper_regularized_gamma(self.shape + 1.0, self.rate() * x)).exp_m1()
    }

    /// The length `x` such that `n` percent of all bases lie in fragments of
    /// length `x` or longer (`n = 50` gives the N50).
    pub fn n_value(&self, n: f64) -> Result<f64, SimulationError> {
        if !(n > 0.0 && n < 100.0) {
            return Err(SimulationError::configuration(format!(
                "N-values must be strictly between 0 and 100, got {}",
                n
            )));
        }

        let target = 1.0 - n / 100.0;
        let mut bottom = 0.0;
        let mut top = 1.0;
        while self.base_weighted_cdf(top) < target {
            bottom = top;
            top *= 2.0;
        }

        while top - bottom > N_VALUE_TOLERANCE {
            let guess = (bottom + top) / 2.0;
            if self.base_weighted_cdf(guess) < target {
                bottom = guess;
            } else {
                top = guess;
            }
        }

        Ok((bottom + top) / 2.0)
    }
}

//======//
// Beta //
//======//

/// Alpha/beta parameters of a beta distribution that is scaled to `[0, max]`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BetaParams {
    /// The alpha parameter.
    pub alpha: f64,

    /// The beta parameter.
    pub beta: f64,
}

/// Common checks on a mean and maximum (both fractions).
fn check_mean_and_max(mean: f64, max: f64) -> Result<(), SimulationError> {
    if !(max > 0.0 && max <= 1.0) {
        return Err(SimulationError::configuration(format!(
            "maximum identity must be in (0, 1], got {}",
            max
        )));
    }

    if !(mean > 0.0 && mean < max) {
        return Err(SimulationError::configuration(format!(
            "mean identity ({}) must be positive and less than the maximum identity ({})",
            mean, max
        )));
    }

    Ok(())
}

impl BetaParams {
    /// Shape-driven derivation: `a = (u/m)k²`, `b = (1 - u/m)k²`.
    pub fn from_shape(mean: f64, shape: f64, max: f64) -> Result<Self, SimulationError> {
        check_mean_and_max(mean, max)?;

        if !(shape > 0.0 && shape.is_finite()) {
            return Err(SimulationError::configuration(format!(
                "beta shape must be positive, got {}",
                shape
            )));
        }

        let ratio = mean / max;
        Ok(BetaParams {
            alpha: ratio * shape.powi(2),
            beta: (1.0 - ratio) * shape.powi(2),
        })
    }

    /// Stdev-driven derivation:
    /// `a = ((1 - u/m)/(s/m)² - m/u)(u/m)²` and `b = a(m/u - 1)`.
    ///
    /// Inconsistent inputs (a standard deviation too large for the room
    /// between the mean and the maximum) give non-positive parameters, which
    /// is reported as an error rather than clamped.
    pub fn from_stdev(mean: f64, stdev: f64, max: f64) -> Result<Self, SimulationError> {
        check_mean_and_max(mean, max)?;

        if !(stdev > 0.0 && stdev.is_finite()) {
            return Err(SimulationError::configuration(format!(
                "identity stdev must be positive, got {}",
                stdev
            )));
        }

        let (u, s, m) = (mean, stdev, max);
        let alpha = ((1.0 - u / m) / (s / m).powi(2) - m / u) * (u / m).powi(2);
        let beta = alpha * (m / u - 1.0);

        if alpha <= 0.0 || beta <= 0.0 {
            return Err(SimulationError::configuration(format!(
                "invalid beta parameters for identity distribution (mean={}, stdev={}, \
                max={}); try reducing the stdev",
                mean, stdev, max
            )));
        }

        Ok(BetaParams { alpha, beta })
    }

    /// Mean of the scaled distribution.
    pub fn mean(&self, max: f64) -> f64 {
        max * self.alpha / (self.alpha + self.beta)
    }
}

//=========//
// Qscores //
//=========//

/// Converts a Phred quality to the identity it implies (`1 - 10^(-q/10)`).
pub fn qscore_to_identity(qscore: f64) -> f64 {
    1.0 - 10f64.powf(-qscore / 10.0)
}

/// Converts a Phred quality to its error probability (`10^(-q/10)`).
pub fn qscore_to_error_probability(qscore: f64) -> f64 {
    10f64.powf(-qscore / 10.0)
}
