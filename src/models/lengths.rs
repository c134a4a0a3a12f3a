//! Fragment lengths, drawn from a gamma distribution or fixed at a constant.

use rand::Rng;
use rand_distr::Distribution;
use rand_distr::Gamma;
use tracing::info;

use crate::errors::SimulationError;
use crate::models::distributions::GammaParams;
use crate::utils::display::formatted_count;

/// Samples fragment lengths.
#[derive(Clone, Debug)]
pub enum FragmentLengths {
    /// Every fragment has the same length.
    Constant(usize),

    /// Fragment lengths follow a gamma distribution.
    Gamma {
        /// The parameters the distribution was built from.
        params: GammaParams,

        /// The distribution itself.
        distribution: Gamma<f64>,
    },
}

impl FragmentLengths {
    /// Builds a length sampler from a mean and standard deviation. A standard
    /// deviation of zero gives a constant length of `round(mean)` (at least 1).
    pub fn new(mean: f64, stdev: f64) -> Result<Self, SimulationError> {
        if !(mean > 0.0 && mean.is_finite()) {
            return Err(SimulationError::configuration(format!(
                "mean fragment length must be positive, got {}",
                mean
            )));
        }

        if stdev == 0.0 {
            return Ok(FragmentLengths::Constant((mean.round() as usize).max(1)));
        }

        let params = GammaParams::from_mean_stdev(mean, stdev)?;
        let distribution = Gamma::new(params.shape, params.scale).map_err(|e| {
            SimulationError::configuration(format!("invalid fragment length distribution: {}", e))
        })?;

        Ok(FragmentLengths::Gamma {
            params,
            distribution,
        })
    }

    /// Draws one fragment length (always at least 1).
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        match self {
            FragmentLengths::Constant(length) => *length,
            FragmentLengths::Gamma { distribution, .. } => {
                (distribution.sample(rng).round() as usize).max(1)
            }
        }
    }

    /// The expected N50 of the fragments.
    pub fn n50(&self) -> Result<f64, SimulationError> {
        match self {
            FragmentLengths::Constant(length) => Ok(*length as f64),
            FragmentLengths::Gamma { params, .. } => params.n_value(50.0),
        }
    }

    /// Logs the parameters of the length distribution.
    pub fn log_summary(&self) -> Result<(), SimulationError> {
        match self {
            FragmentLengths::Constant(length) => {
                info!("Fragment lengths are fixed at {} bp.", formatted_count(*length));
            }
            FragmentLengths::Gamma { params, .. } => {
                info!(
                    "Fragment lengths follow a gamma distribution (shape = {:.4e}, scale = {:.4e}).",
                    params.shape, params.scale
                );
                info!("Expected fragment N50: {:.0} bp.", self.n50()?);
            }
        }

        Ok(())
    }
}
