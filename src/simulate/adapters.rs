//! Adapter sequences at the start and end of reads.
//!
//! A start adapter is ligated to the 5' end of a read, so partial start
//! adapters keep their 3' end (a suffix). End adapters keep their 5' end (a
//! prefix).

use rand::Rng;
use rand_distr::Beta;
use rand_distr::Distribution;

use crate::errors::SimulationError;
use crate::utils::args::AdapterSequence;
use crate::utils::args::RateAmount;
use crate::utils::sequence::random_sequence;

/// Which end of the read an adapter belongs to.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AdapterEnd {
    /// Keeps a suffix of the adapter.
    Start,

    /// Keeps a prefix of the adapter.
    End,
}

/// An adapter along with how often, and how much of it, appears.
#[derive(Clone, Debug)]
pub struct Adapter {
    end: AdapterEnd,
    sequence: Vec<u8>,
    rate: f64,
    amount: f64,
    lengths: Option<Beta<f64>>,
}

impl Adapter {
    /// Creates an adapter. `rate` is the chance that the adapter is present
    /// at all and `amount` is the mean fraction of it that is present.
    pub fn new(
        end: AdapterEnd,
        sequence: Vec<u8>,
        rate: f64,
        amount: f64,
    ) -> Result<Self, SimulationError> {
        if !(0.0..=1.0).contains(&rate) || !(0.0..=1.0).contains(&amount) {
            return Err(SimulationError::configuration(
                "adapter rate and amount must be between 0 and 100",
            ));
        }

        let lengths = match amount {
            a if a == 0.0 || a == 1.0 => None,
            a => Some(Beta::new(2.0 * a, 2.0 - 2.0 * a).map_err(|e| {
                SimulationError::configuration(format!("invalid adapter amount: {}", e))
            })?),
        };

        Ok(Adapter {
            end,
            sequence,
            rate,
            amount,
            lengths,
        })
    }

    /// Creates an adapter from command line values, generating a random
    /// adapter sequence when only a length was given.
    pub fn from_args<R: Rng + ?Sized>(
        end: AdapterEnd,
        sequence: &AdapterSequence,
        params: RateAmount,
        rng: &mut R,
    ) -> Result<Self, SimulationError> {
        let sequence = match sequence {
            AdapterSequence::Sequence(sequence) => sequence.clone(),
            AdapterSequence::Random(length) => random_sequence(*length, rng),
        };

        Self::new(end, sequence, params.rate, params.amount)
    }

    /// The full adapter sequence.
    pub fn sequence(&self) -> &[u8] {
        &self.sequence
    }

    /// Draws the adapter piece for one read (possibly empty).
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<u8> {
        if self.sequence.is_empty() || !rng.gen_bool(self.rate) {
            return Vec::new();
        }

        let length = match &self.lengths {
            None if self.amount == 1.0 => self.sequence.len(),
            None => 0,
            Some(beta) => {
                ((self.sequence.len() as f64 * beta.sample(rng)).round() as usize)
                    .min(self.sequence.len())
            }
        };

        match self.end {
            AdapterEnd::Start => self.sequence[self.sequence.len() - length..].to_vec(),
            AdapterEnd::End => self.sequence[..length].to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    const ADAPTER: &[u8] = b"AATGTACTTCGTTCAGTTACGTATTGCT";

    #[test]
    fn test_full_adapters() {
        let mut rng = StdRng::seed_from_u64(0);
        let start = Adapter::new(AdapterEnd::Start, ADAPTER.to_vec(), 1.0, 1.0).unwrap();
        let end = Adapter::new(AdapterEnd::End, ADAPTER.to_vec(), 1.0, 1.0).unwrap();
        for _ in 0..100 {
            assert_eq!(start.sample(&mut rng), ADAPTER);
            assert_eq!(end.sample(&mut rng), ADAPTER);
        }
    }

    #[test]
    fn test_absent_and_empty_adapters() {
        let mut rng = StdRng::seed_from_u64(0);
        let never = Adapter::new(AdapterEnd::Start, ADAPTER.to_vec(), 0.0, 1.0).unwrap();
        let nothing = Adapter::new(AdapterEnd::End, ADAPTER.to_vec(), 1.0, 0.0).unwrap();
        for _ in 0..100 {
            assert!(never.sample(&mut rng).is_empty());
            assert!(nothing.sample(&mut rng).is_empty());
        }
    }

    #[test]
    fn test_partial_adapters() {
        let mut rng = StdRng::seed_from_u64(1);
        let start = Adapter::new(AdapterEnd::Start, ADAPTER.to_vec(), 1.0, 0.5).unwrap();
        let end = Adapter::new(AdapterEnd::End, ADAPTER.to_vec(), 1.0, 0.5).unwrap();

        let mut total = 0;
        for _ in 0..10_000 {
            let piece = start.sample(&mut rng);
            assert!(ADAPTER.ends_with(&piece));
            total += piece.len();

            let piece = end.sample(&mut rng);
            assert!(ADAPTER.starts_with(&piece));
        }

        let mean_fraction = total as f64 / 10_000.0 / ADAPTER.len() as f64;
        assert!((mean_fraction - 0.5).abs() < 0.03);
    }

    #[test]
    fn test_adapter_rate() {
        let mut rng = StdRng::seed_from_u64(2);
        let adapter = Adapter::new(AdapterEnd::Start, ADAPTER.to_vec(), 0.3, 1.0).unwrap();
        let present = (0..10_000)
            .filter(|_| !adapter.sample(&mut rng).is_empty())
            .count();
        assert!((present as f64 / 10_000.0 - 0.3).abs() < 0.02);
    }

    #[test]
    fn test_random_adapter() {
        let mut rng = StdRng::seed_from_u64(3);
        let params = RateAmount {
            rate: 1.0,
            amount: 1.0,
        };
        let adapter =
            Adapter::from_args(AdapterEnd::End, &AdapterSequence::Random(40), params, &mut rng)
                .unwrap();
        assert_eq!(adapter.sequence().len(), 40);

        // The random adapter is generated once and reused.
        let first = adapter.sample(&mut rng);
        assert_eq!(first, adapter.sample(&mut rng));
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(Adapter::new(AdapterEnd::Start, ADAPTER.to_vec(), 1.5, 0.5).is_err());
        assert!(Adapter::new(AdapterEnd::Start, ADAPTER.to_vec(), 0.5, -0.1).is_err());
    }
}
