//! Per-read target identities.
//!
//! Identities come from one of three places: a constant (when the
//! distribution collapses, or when the error model never introduces errors),
//! a beta distribution scaled to `[0, max]`, or a normal distribution over
//! qscores which is converted to an identity with `1 - 10^(-q/10)`.

use rand::Rng;
use rand_distr::Beta;
use rand_distr::Distribution;
use rand_distr::Normal;
use tracing::info;

use crate::errors::SimulationError;
use crate::models::distributions::qscore_to_identity;
use crate::models::distributions::BetaParams;

/// Samples a target identity (a fraction in `[0, 1]`) for each read.
#[derive(Clone, Debug)]
pub enum Identities {
    /// Every read has the same target identity.
    Constant(f64),

    /// Identities are `max * Beta(alpha, beta)`.
    Beta {
        /// The maximum identity.
        max: f64,

        /// The derived parameters.
        params: BetaParams,

        /// The (unscaled) distribution.
        distribution: Beta<f64>,
    },

    /// Qscores are normally distributed and converted to identities.
    NormalQscore {
        /// Mean qscore.
        mean: f64,

        /// The qscore distribution.
        distribution: Normal<f64>,
    },
}

impl Identities {
    /// A beta distribution described by its mean, standard deviation and
    /// maximum (all fractions). Collapses to a constant when the mean equals
    /// the maximum or the standard deviation is zero.
    pub fn beta(mean: f64, stdev: f64, max: f64) -> Result<Self, SimulationError> {
        if mean == max || stdev == 0.0 {
            return Self::constant(mean);
        }

        let params = BetaParams::from_stdev(mean, stdev, max)?;
        Self::from_beta_params(params, max)
    }

    /// A beta distribution described by its mean, a shape parameter and
    /// maximum (all fractions). Collapses to a constant when the mean equals
    /// the maximum.
    pub fn beta_with_shape(mean: f64, shape: f64, max: f64) -> Result<Self, SimulationError> {
        if mean == max {
            return Self::constant(mean);
        }

        let params = BetaParams::from_shape(mean, shape, max)?;
        Self::from_beta_params(params, max)
    }

    fn from_beta_params(params: BetaParams, max: f64) -> Result<Self, SimulationError> {
        let distribution = Beta::new(params.alpha, params.beta).map_err(|e| {
            SimulationError::configuration(format!("invalid identity distribution: {}", e))
        })?;

        Ok(Identities::Beta {
            max,
            params,
            distribution,
        })
    }

    /// Normally distributed qscores. Collapses to a constant identity when the
    /// standard deviation is zero.
    pub fn normal_qscore(mean: f64, stdev: f64) -> Result<Self, SimulationError> {
        if !(mean.is_finite() && stdev.is_finite() && stdev >= 0.0) {
            return Err(SimulationError::configuration(format!(
                "invalid qscore distribution (mean={}, stdev={})",
                mean, stdev
            )));
        }

        if stdev == 0.0 {
            return Self::constant(qscore_to_identity(mean));
        }

        let distribution = Normal::new(mean, stdev).map_err(|e| {
            SimulationError::configuration(format!("invalid qscore distribution: {}", e))
        })?;

        Ok(Identities::NormalQscore { mean, distribution })
    }

    /// A fixed identity.
    pub fn constant(identity: f64) -> Result<Self, SimulationError> {
        if !(0.0..=1.0).contains(&identity) {
            return Err(SimulationError::configuration(format!(
                "identity must be between 0 and 1, got {}",
                identity
            )));
        }

        Ok(Identities::Constant(identity))
    }

    /// Draws a target identity.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match self {
            Identities::Constant(identity) => *identity,
            Identities::Beta {
                max, distribution, ..
            } => max * distribution.sample(rng),
            Identities::NormalQscore { distribution, .. } => loop {
                let identity = qscore_to_identity(distribution.sample(rng));
                if (0.0..=1.0).contains(&identity) {
                    break identity;
                }
            },
        }
    }

    /// Logs the parameters of the identity distribution.
    pub fn log_summary(&self) {
        match self {
            Identities::Constant(identity) => {
                info!("Read identities are fixed at {:.2}%.", identity * 100.0)
            }
            Identities::Beta { max, params, .. } => info!(
                "Read identities follow a beta distribution (alpha = {:.4e}, beta = {:.4e}, \
                max = {:.2}%, mean = {:.2}%).",
                params.alpha,
                params.beta,
                max * 100.0,
                params.mean(*max) * 100.0
            ),
            Identities::NormalQscore { mean, distribution } => info!(
                "Read qscores follow a normal distribution (mean = Q{}, stdev = {}).",
                mean,
                distribution.std_dev()
            ),
        }
    }
}
