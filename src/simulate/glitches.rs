//! Glitches: points in a read where the signal goes wrong, so that some random
//! sequence is added and/or some real sequence is lost.

use rand::Rng;
use rand_distr::Distribution;
use rand_distr::Geometric;

use crate::errors::SimulationError;
use crate::utils::args::GlitchParams;
use crate::utils::sequence::random_sequence;

#[derive(Clone, Debug)]
struct GlitchDistributions {
    distance: Geometric,
    size: Geometric,
    skip: Geometric,
}

/// Adds glitches to fragments.
#[derive(Clone, Debug)]
pub struct Glitches {
    distributions: Option<GlitchDistributions>,
}

fn geometric(p: f64) -> Result<Geometric, SimulationError> {
    Geometric::new(p).map_err(|e| {
        SimulationError::configuration(format!("invalid glitch parameters: {}", e))
    })
}

impl Glitches {
    /// Glitches occur on average every `rate` bases, add `size` random bases
    /// and lose `skip` real bases (all means of geometric distributions).
    pub fn new(params: GlitchParams) -> Result<Self, SimulationError> {
        if params.rate == 0.0 || (params.size == 0.0 && params.skip == 0.0) {
            return Ok(Glitches {
                distributions: None,
            });
        }

        Ok(Glitches {
            distributions: Some(GlitchDistributions {
                distance: geometric((1.0 / params.rate).min(1.0))?,
                size: geometric(1.0 / (params.size + 1.0))?,
                skip: geometric(1.0 / (params.skip + 1.0))?,
            }),
        })
    }

    /// Whether glitches never change anything.
    pub fn is_disabled(&self) -> bool {
        self.distributions.is_none()
    }

    /// Returns the fragment with glitches added.
    pub fn apply<R: Rng + ?Sized>(&self, fragment: &[u8], rng: &mut R) -> Vec<u8> {
        let distributions = match &self.distributions {
            Some(distributions) => distributions,
            None => return fragment.to_vec(),
        };

        let mut result = Vec::with_capacity(fragment.len());
        let mut i: usize = 0;

        loop {
            let distance = distributions.distance.sample(rng) as usize + 1;
            let end = i.saturating_add(distance).min(fragment.len());
            result.extend_from_slice(&fragment[i..end]);
            i = end;
            if i >= fragment.len() {
                break;
            }

            let size = distributions.size.sample(rng) as usize;
            result.extend(random_sequence(size, rng));

            let skip = distributions.skip.sample(rng) as usize;
            i = i.saturating_add(skip);
            if i >= fragment.len() {
                break;
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    fn params(rate: f64, size: f64, skip: f64) -> GlitchParams {
        GlitchParams { rate, size, skip }
    }

    #[test]
    fn test_disabled_glitches() {
        let mut rng = StdRng::seed_from_u64(0);
        let fragment = random_sequence(1000, &mut rng);
        for p in [params(0.0, 25.0, 25.0), params(100.0, 0.0, 0.0)] {
            let glitches = Glitches::new(p).unwrap();
            assert!(glitches.is_disabled());
            assert_eq!(glitches.apply(&fragment, &mut rng), fragment);
        }
    }

    #[test]
    fn test_skip_only_glitches_shorten_reads() {
        let mut rng = StdRng::seed_from_u64(1);
        let fragment = random_sequence(10_000, &mut rng);
        let glitches = Glitches::new(params(100.0, 0.0, 20.0)).unwrap();
        let glitched = glitches.apply(&fragment, &mut rng);
        assert!(glitched.len() < fragment.len());

        // With no added sequence, the result is a subsequence of the original.
        let mut remaining = fragment.iter();
        assert!(glitched.iter().all(|b| remaining.any(|c| c == b)));
    }

    #[test]
    fn test_size_only_glitches_lengthen_reads() {
        let mut rng = StdRng::seed_from_u64(2);
        let fragment = random_sequence(10_000, &mut rng);
        let glitches = Glitches::new(params(100.0, 20.0, 0.0)).unwrap();
        let glitched = glitches.apply(&fragment, &mut rng);

        // About 100 glitches, each adding about 20 bases.
        let added = glitched.len() - fragment.len();
        assert!((1000..3000).contains(&added), "added {}", added);
    }

    #[test]
    fn test_glitch_rate_of_one() {
        let mut rng = StdRng::seed_from_u64(3);
        let fragment = random_sequence(100, &mut rng);
        let glitches = Glitches::new(params(0.5, 1.0, 1.0)).unwrap();
        let glitched = glitches.apply(&fragment, &mut rng);
        assert_ne!(glitched, fragment);
    }

    #[test]
    fn test_empty_fragment() {
        let mut rng = StdRng::seed_from_u64(4);
        let glitches = Glitches::new(params(100.0, 20.0, 20.0)).unwrap();
        assert!(glitches.apply(b"", &mut rng).is_empty());
    }
}
