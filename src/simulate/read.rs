//! Putting a read together: fragments, chimeras, adapters, glitches, errors
//! and qualities.

use std::fmt::Write;

use itertools::Itertools;
use noodles::fastq;
use rand::Rng;

use crate::errors::SimulationError;
use crate::models::error_model::ErrorModel;
use crate::models::identities::Identities;
use crate::models::qscore_model::QScoreModel;
use crate::simulate::adapters::Adapter;
use crate::simulate::fragments::FragmentAssembler;
use crate::simulate::fragments::FragmentDescriptor;
use crate::simulate::glitches::Glitches;
use crate::simulate::mutate::sequence_fragment;

/// A finished read.
#[derive(Clone, Debug)]
pub struct SimulatedRead {
    /// A random UUID-style read name.
    pub name: String,

    /// Where each of the read's fragments came from, in order.
    pub descriptors: Vec<FragmentDescriptor>,

    /// The length of the read before errors were added.
    pub error_free_length: usize,

    /// The read bases.
    pub sequence: Vec<u8>,

    /// The FASTQ quality characters.
    pub qualities: Vec<u8>,

    /// The identity of the read to its error-free version.
    pub identity: f64,
}

impl SimulatedRead {
    /// Whether the read is made of more than one fragment.
    pub fn is_chimeric(&self) -> bool {
        self.descriptors.len() > 1
    }

    /// Whether any fragment in the read is junk.
    pub fn has_junk(&self) -> bool {
        self.descriptors.contains(&FragmentDescriptor::Junk)
    }

    /// Whether any fragment in the read is random sequence.
    pub fn has_random(&self) -> bool {
        self.descriptors.contains(&FragmentDescriptor::Random)
    }

    /// The FASTQ header description, e.g.
    /// `chr1,+strand,100-5100 length=4981 error-free_length=5020 read_identity=95.12%`.
    pub fn description(&self) -> String {
        let mut description = self.descriptors.iter().join(",chimera,");
        // Writing to a String cannot fail.
        let _ = write!(
            description,
            " length={} error-free_length={} read_identity={:.2}%",
            self.sequence.len(),
            self.error_free_length,
            self.identity * 100.0
        );
        description
    }

    /// Converts the read into a FASTQ record.
    pub fn to_fastq(&self) -> fastq::Record {
        fastq::Record::new(
            format!("{} {}", self.name, self.description()),
            self.sequence.clone(),
            self.qualities.clone(),
        )
    }
}

/// Builds a random (version 4) UUID from the generator, so that names are
/// reproducible for a given seed.
pub fn read_name<R: Rng + ?Sized>(rng: &mut R) -> String {
    let mut bytes: [u8; 16] = rng.gen();
    bytes[6] = (bytes[6] & 0x0f) | 0x40;
    bytes[8] = (bytes[8] & 0x3f) | 0x80;

    let hex: String = bytes.iter().map(|b| format!("{:02x}", b)).collect();
    format!(
        "{}-{}-{}-{}-{}",
        &hex[0..8],
        &hex[8..12],
        &hex[12..16],
        &hex[16..20],
        &hex[20..32]
    )
}

/// The chances of adapters at a chimeric junction.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ChimeraAdapterRates {
    /// Chance of an end adapter closing the previous fragment.
    pub end: f64,

    /// Chance of a start adapter opening the next fragment.
    pub start: f64,
}

/// Everything needed to make reads.
#[derive(Debug)]
pub struct ReadSimulator {
    /// Source of fragments.
    pub assembler: FragmentAssembler,

    /// Per-read target identities.
    pub identities: Identities,

    /// How errors are added.
    pub error_model: ErrorModel,

    /// How qualities are assigned.
    pub qscore_model: QScoreModel,

    /// The adapter at the start of reads.
    pub start_adapter: Adapter,

    /// The adapter at the end of reads.
    pub end_adapter: Adapter,

    /// Glitches added before errors.
    pub glitches: Glitches,

    /// Chance (as a fraction) of each additional chimeric fragment.
    pub chimera_rate: f64,

    /// Adapter chances at chimeric junctions.
    pub chimera_adapter_rates: ChimeraAdapterRates,
}

impl ReadSimulator {
    /// Makes one read.
    pub fn next_read<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<SimulatedRead, SimulationError> {
        let name = read_name(rng);

        let mut pieces = vec![self.start_adapter.sample(rng)];
        let mut descriptors = Vec::new();

        let fragment = self.assembler.fragment(rng)?;
        pieces.push(fragment.sequence);
        descriptors.push(fragment.descriptor);

        while rng.gen_bool(self.chimera_rate) {
            if rng.gen_bool(self.chimera_adapter_rates.end) {
                pieces.push(self.end_adapter.sample(rng));
            }
            if rng.gen_bool(self.chimera_adapter_rates.start) {
                pieces.push(self.start_adapter.sample(rng));
            }

            let fragment = self.assembler.fragment(rng)?;
            pieces.push(fragment.sequence);
            descriptors.push(fragment.descriptor);
        }

        pieces.push(self.end_adapter.sample(rng));

        let error_free = self.glitches.apply(&pieces.concat(), rng);
        let target_identity = self.identities.sample(rng);
        let sequenced = sequence_fragment(
            &error_free,
            target_identity,
            &self.error_model,
            &self.qscore_model,
            rng,
        );

        Ok(SimulatedRead {
            name,
            descriptors,
            error_free_length: error_free.len(),
            sequence: sequenced.sequence,
            qualities: sequenced.qualities,
            identity: sequenced.identity,
        })
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;
    use crate::models::lengths::FragmentLengths;
    use crate::simulate::adapters::AdapterEnd;
    use crate::simulate::fragments::Strand;
    use crate::simulate::references::Contig;
    use crate::simulate::references::References;
    use crate::utils::args::GlitchParams;
    use crate::utils::sequence::random_sequence;

    fn simulator(chimera_rate: f64, identity: f64, rng: &mut StdRng) -> ReadSimulator {
        // Circular, so every fragment has the full sampled length.
        let contig = Contig::new("chr", &random_sequence(20_000, rng), 1.0, true).unwrap();
        let references = References::from_contigs(vec![contig]).unwrap();
        let lengths = FragmentLengths::new(2000.0, 0.0).unwrap();

        ReadSimulator {
            assembler: FragmentAssembler::new(references, lengths, 0.0, 0.0, false, rng).unwrap(),
            identities: Identities::constant(identity).unwrap(),
            error_model: ErrorModel::Random,
            qscore_model: QScoreModel::Random,
            start_adapter: Adapter::new(AdapterEnd::Start, b"AAAAAAAAAA".to_vec(), 1.0, 1.0)
                .unwrap(),
            end_adapter: Adapter::new(AdapterEnd::End, b"CCCCCCCCCC".to_vec(), 1.0, 1.0).unwrap(),
            glitches: Glitches::new(GlitchParams {
                rate: 0.0,
                size: 0.0,
                skip: 0.0,
            })
            .unwrap(),
            chimera_rate,
            chimera_adapter_rates: ChimeraAdapterRates {
                end: 0.25,
                start: 0.25,
            },
        }
    }

    #[test]
    fn test_read_name_is_uuid_shaped() {
        let mut rng = StdRng::seed_from_u64(0);
        let name = read_name(&mut rng);
        assert_eq!(name.len(), 36);
        let groups: Vec<&str> = name.split('-').collect();
        assert_eq!(
            groups.iter().map(|g| g.len()).collect::<Vec<_>>(),
            vec![8, 4, 4, 4, 12]
        );
        assert!(groups[2].starts_with('4'));
        assert!("89ab".contains(&groups[3][..1]));
        assert_ne!(name, read_name(&mut rng));
    }

    #[test]
    fn test_description() {
        let read = SimulatedRead {
            name: String::from("id"),
            descriptors: vec![
                FragmentDescriptor::Reference {
                    contig: String::from("chr1"),
                    strand: Strand::Forward,
                    start: 0,
                    end: 100,
                },
                FragmentDescriptor::Junk,
            ],
            error_free_length: 120,
            sequence: b"ACGT".to_vec(),
            qualities: b"IIII".to_vec(),
            identity: 0.95123,
        };

        assert!(read.is_chimeric());
        assert!(read.has_junk());
        assert!(!read.has_random());
        assert_eq!(
            read.description(),
            "chr1,+strand,0-100,chimera,junk_seq length=4 error-free_length=120 read_identity=95.12%"
        );
    }

    #[test]
    fn test_reads_have_adapters_and_matching_qualities() {
        let mut rng = StdRng::seed_from_u64(1);
        let simulator = simulator(0.0, 0.9, &mut rng);

        for _ in 0..5 {
            let read = simulator.next_read(&mut rng).unwrap();
            assert_eq!(read.sequence.len(), read.qualities.len());
            assert_eq!(read.error_free_length, 2020);
            assert_eq!(read.descriptors.len(), 1);
            assert!((read.identity - 0.9).abs() < 0.05);
        }
    }

    #[test]
    fn test_chimeras() {
        let mut rng = StdRng::seed_from_u64(2);
        let simulator = simulator(0.5, 1.0, &mut rng);

        let chimeric = (0..100)
            .map(|_| simulator.next_read(&mut rng).unwrap())
            .filter(SimulatedRead::is_chimeric)
            .count();
        assert!((30..=70).contains(&chimeric), "{} chimeric reads", chimeric);
    }
}
