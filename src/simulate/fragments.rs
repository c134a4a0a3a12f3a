//! Building the fragments that reads are sequenced from.
//!
//! Each fragment is one of three things:
//!
//! * junk: a short random unit repeated for the whole fragment length,
//! * random: uniformly random bases,
//! * a piece of a reference contig, taken from either strand.
//!
//! Contigs are chosen in proportion to `depth * length`. Because fragments
//! from short contigs are truncated (linear) or dropped (circular, with the
//! small plasmid bias), the depths are first adjusted so that every contig
//! ends up sequenced at its intended relative depth.

use std::fmt;

use rand::Rng;
use rand_distr::Distribution;
use rand_distr::WeightedIndex;
use tracing::debug;
use tracing::info;

use crate::errors::SimulationError;
use crate::models::lengths::FragmentLengths;
use crate::simulate::references::References;
use crate::simulate::settings;
use crate::utils::sequence::random_sequence;

//=============//
// Descriptors //
//=============//

/// The strand a reference fragment was taken from.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Strand {
    /// The contig as written.
    Forward,

    /// The reverse complement of the contig.
    Reverse,
}

impl fmt::Display for Strand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strand::Forward => write!(f, "+strand"),
            Strand::Reverse => write!(f, "-strand"),
        }
    }
}

/// Where a fragment came from.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum FragmentDescriptor {
    /// A piece of a reference contig. Coordinates are on the given strand;
    /// for circular contigs `end` may run past the contig length when the
    /// fragment wraps around the origin.
    Reference {
        /// The contig name.
        contig: String,

        /// The strand.
        strand: Strand,

        /// Zero-based start.
        start: usize,

        /// Exclusive end.
        end: usize,
    },

    /// A repeated random unit.
    Junk,

    /// Uniformly random bases.
    Random,
}

impl fmt::Display for FragmentDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FragmentDescriptor::Reference {
                contig,
                strand,
                start,
                end,
            } => write!(f, "{},{},{}-{}", contig, strand, start, end),
            FragmentDescriptor::Junk => write!(f, "junk_seq"),
            FragmentDescriptor::Random => write!(f, "random_seq"),
        }
    }
}

/// A fragment's bases along with where they came from.
#[derive(Clone, Debug)]
pub struct Fragment {
    /// The bases.
    pub sequence: Vec<u8>,

    /// The origin of the bases.
    pub descriptor: FragmentDescriptor,
}

//===================//
// Junk and random   //
//===================//

/// A random unit of 1 to 5 bases, repeated and truncated to `length`.
pub fn junk_sequence<R: Rng + ?Sized>(length: usize, rng: &mut R) -> Vec<u8> {
    let unit = random_sequence(rng.gen_range(1..=5), rng);
    unit.iter().copied().cycle().take(length).collect()
}

//==================//
// Depth adjustment //
//==================//

/// Scales contig depths to make up for fragments that are lost or shortened.
///
/// A sample of fragment lengths is drawn. Linear contigs are scaled by
/// `sum(lengths) / sum(min(length, contig length))`. With the small plasmid
/// bias, circular contigs are scaled by `sum(lengths) / sum(lengths that
/// fit)`, and it is an error if no sampled length fits.
pub fn adjust_depths<R: Rng + ?Sized>(
    references: &mut References,
    lengths: &FragmentLengths,
    small_plasmid_bias: bool,
    rng: &mut R,
) -> Result<(), SimulationError> {
    let samples: Vec<usize> = (0..settings::DEPTH_ADJUSTMENT_SAMPLES)
        .map(|_| lengths.sample(rng))
        .collect();
    let total = samples.iter().map(|l| *l as f64).sum::<f64>();

    for contig in references.iter_mut() {
        let contig_length = contig.len();

        let usable = match (contig.is_circular(), small_plasmid_bias) {
            (true, true) => samples
                .iter()
                .filter(|l| **l <= contig_length)
                .map(|l| *l as f64)
                .sum::<f64>(),
            (true, false) => continue,
            (false, _) => samples
                .iter()
                .map(|l| (*l).min(contig_length) as f64)
                .sum::<f64>(),
        };

        if usable == 0.0 {
            return Err(SimulationError::configuration(format!(
                "fragment length distribution is incompatible with the length of `{}` - try \
                running without --small-plasmid-bias",
                contig.name()
            )));
        }

        let adjustment = total / usable;
        let depth = contig.depth() * adjustment;
        if adjustment > 1.0 {
            info!(
                "  [*] Adjusted depth of {} from {:.3}x to {:.3}x.",
                contig.name(),
                contig.depth(),
                depth
            );
        }
        contig.set_depth(depth);
    }

    Ok(())
}

//====================//
// Fragment assembler //
//====================//

/// Produces fragments from the reference.
#[derive(Debug)]
pub struct FragmentAssembler {
    references: References,
    lengths: FragmentLengths,
    contig_weights: WeightedIndex<f64>,
    junk_rate: f64,
    random_rate: f64,
    small_plasmid_bias: bool,
}

impl FragmentAssembler {
    /// Creates an assembler, adjusting the contig depths first. The junk and
    /// random rates are fractions.
    pub fn new<R: Rng + ?Sized>(
        mut references: References,
        lengths: FragmentLengths,
        junk_rate: f64,
        random_rate: f64,
        small_plasmid_bias: bool,
        rng: &mut R,
    ) -> Result<Self, SimulationError> {
        if !(0.0..=1.0).contains(&(junk_rate + random_rate)) || junk_rate < 0.0 || random_rate < 0.0
        {
            return Err(SimulationError::configuration(
                "junk and random read rates must add up to at most 100%",
            ));
        }

        adjust_depths(&mut references, &lengths, small_plasmid_bias, rng)?;

        let weights: Vec<f64> = references
            .iter()
            .map(|contig| contig.depth() * contig.len() as f64)
            .collect();
        let contig_weights = WeightedIndex::new(&weights).map_err(|e| {
            SimulationError::configuration(format!("could not weight reference contigs: {}", e))
        })?;

        Ok(FragmentAssembler {
            references,
            lengths,
            contig_weights,
            junk_rate,
            random_rate,
            small_plasmid_bias,
        })
    }

    /// The (depth adjusted) references.
    pub fn references(&self) -> &References {
        &self.references
    }

    /// Builds one fragment.
    pub fn fragment<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Fragment, SimulationError> {
        let length = self.lengths.sample(rng);

        let draw = rng.gen::<f64>();
        if draw < self.junk_rate {
            return Ok(Fragment {
                sequence: junk_sequence(length, rng),
                descriptor: FragmentDescriptor::Junk,
            });
        } else if draw < self.junk_rate + self.random_rate {
            return Ok(Fragment {
                sequence: random_sequence(length, rng),
                descriptor: FragmentDescriptor::Random,
            });
        }

        // The sampled length is kept across attempts; only the contig changes.
        for _ in 0..settings::MAX_FRAGMENT_ATTEMPTS {
            if let Some(fragment) = self.reference_fragment(length, rng) {
                return Ok(fragment);
            }
        }

        Err(SimulationError::RetryExhausted {
            attempts: settings::MAX_FRAGMENT_ATTEMPTS,
        })
    }

    /// Takes a piece of a randomly chosen contig. Returns `None` when a
    /// circular contig is too short for the fragment under the small plasmid
    /// bias.
    fn reference_fragment<R: Rng + ?Sized>(&self, length: usize, rng: &mut R) -> Option<Fragment> {
        let contig = self.references.get_index(self.contig_weights.sample(rng))?;
        let (strand, sequence) = match rng.gen_bool(0.5) {
            true => (Strand::Forward, contig.sequence()),
            false => (Strand::Reverse, contig.reverse_complement()),
        };
        let contig_length = sequence.len();

        let descriptor = |start, end| FragmentDescriptor::Reference {
            contig: contig.name().to_string(),
            strand,
            start,
            end,
        };

        if !contig.is_circular() && length >= contig_length {
            return Some(Fragment {
                sequence: sequence.to_vec(),
                descriptor: descriptor(0, contig_length),
            });
        }

        let length = match contig.is_circular() && length > contig_length {
            true if self.small_plasmid_bias => {
                debug!(
                    "Fragment of {} bp does not fit circular contig {}.",
                    length,
                    contig.name()
                );
                return None;
            }
            true => contig_length,
            false => length,
        };

        let start = rng.gen_range(0..contig_length);
        let end = start + length;

        let fragment = match (contig.is_circular(), end <= contig_length) {
            (_, true) => Fragment {
                sequence: sequence[start..end].to_vec(),
                descriptor: descriptor(start, end),
            },
            (true, false) => Fragment {
                sequence: [&sequence[start..], &sequence[..end - contig_length]].concat(),
                descriptor: descriptor(start, end),
            },
            (false, false) => Fragment {
                sequence: sequence[start..].to_vec(),
                descriptor: descriptor(start, contig_length),
            },
        };

        Some(fragment)
    }
}
