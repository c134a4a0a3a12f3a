//! The k-mer error model used to mutate fragments.
//!
//! A trained model maps each k-mer to the alternatives it is read as, each
//! with a probability. An alternative is stored as a [`KmerRepresentation`]:
//! one [`Slot`] per k-mer position, so that an alternative can be laid over
//! the fragment position-by-position even when it contains insertions or
//! deletions. Whatever probability is not accounted for by the listed
//! alternatives is spent on a single random edit.
//!
//! Model files have one k-mer per line:
//!
//! ```text
//! ACGTA,0.91;ACTA,0.02;ACGGTA,0.01;...
//! ```
//!
//! The first entry is the k-mer itself (its probability is the chance of no
//! change) and every k-mer in a file must have the same length.

use std::collections::HashMap;
use std::io::BufRead;
use std::path::Path;

use anyhow::Context;
use rand::Rng;
use tracing::debug;
use tracing::info;

use crate::errors::SimulationError;
use crate::models::resolve_preset;
use crate::utils::alignment;
use crate::utils::cigar::CigarOp;
use crate::utils::formats::open_maybe_gzipped;
use crate::utils::sequence::random_base;
use crate::utils::sequence::random_different_base;

/// Probabilities for a single k-mer may overshoot 1 by this much (rounding in
/// model files) before the line is rejected.
const PROBABILITY_SLACK: f64 = 0.01;

//=======//
// Slots //
//=======//

/// What one original base turned into.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum Slot {
    /// The base was deleted.
    Deleted,

    /// The base was kept or substituted.
    Single(u8),

    /// Two or more bases, i.e. the base plus inserted sequence.
    Inserted(Vec<u8>),
}

/// A k-mer as it was read: one slot per original position.
pub type KmerRepresentation = Vec<Slot>;

impl Slot {
    /// Builds a slot from its output bytes.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        match bytes {
            [] => Slot::Deleted,
            [base] => Slot::Single(*base),
            _ => Slot::Inserted(bytes.to_vec()),
        }
    }

    /// The bytes this slot outputs.
    pub fn bytes(&self) -> &[u8] {
        match self {
            Slot::Deleted => &[],
            Slot::Single(base) => std::slice::from_ref(base),
            Slot::Inserted(bases) => bases,
        }
    }

    /// The number of bytes this slot outputs.
    pub fn len(&self) -> usize {
        self.bytes().len()
    }

    /// Whether this slot outputs nothing.
    pub fn is_empty(&self) -> bool {
        matches!(self, Slot::Deleted)
    }

    /// Whether this slot is exactly the given (unchanged) base.
    pub fn is_base(&self, base: u8) -> bool {
        matches!(self, Slot::Single(b) if *b == base)
    }
}

/// The identity representation of a k-mer (every base in its own slot).
pub fn representation_of(kmer: &[u8]) -> KmerRepresentation {
    kmer.iter().map(|base| Slot::Single(*base)).collect()
}

/// Flattens a representation into the bytes it outputs.
pub fn representation_bytes(representation: &[Slot]) -> Vec<u8> {
    representation
        .iter()
        .flat_map(|slot| slot.bytes().iter().copied())
        .collect()
}

//==============//
// Random edits //
//==============//

/// Applies exactly one random edit to the k-mer: the edit type (substitution,
/// insertion or deletion) and position are chosen uniformly. A substitution
/// uses one of the three other bases; an insertion adds one of the four bases
/// either before or after the chosen base.
pub fn random_edit<R: Rng + ?Sized>(kmer: &[u8], rng: &mut R) -> KmerRepresentation {
    let mut representation = representation_of(kmer);
    if kmer.is_empty() {
        return representation;
    }

    let i = rng.gen_range(0..kmer.len());
    let base = kmer[i];

    representation[i] = match rng.gen_range(0..3) {
        0 => Slot::Single(random_different_base(base, rng)),
        1 => {
            let inserted = random_base(rng);
            if rng.gen_bool(0.5) {
                Slot::Inserted(vec![base, inserted])
            } else {
                Slot::Inserted(vec![inserted, base])
            }
        }
        _ => Slot::Deleted,
    };

    representation
}

//=============//
// Align kmers //
//=============//

/// Expresses `alt` as a representation of `kmer`. Both must share their first
/// and last bases (which keep their own slots); the interiors are aligned by
/// edit distance to decide which slots are substituted, deleted or carry
/// insertions. When several alignments are equally good, any of them may be
/// returned.
///
/// ```
/// use lrsim::models::error_model::{align_kmers, representation_bytes};
/// let representation = align_kmers(b"ACGT", b"ATCGT").unwrap();
/// assert_eq!(representation.len(), 4);
/// assert_eq!(representation_bytes(&representation), b"ATCGT");
/// ```
pub fn align_kmers(kmer: &[u8], alt: &[u8]) -> Result<KmerRepresentation, SimulationError> {
    if kmer.len() < 3 {
        return Err(SimulationError::resource(format!(
            "k-mers must be at least 3 bases long to align alternatives: {}",
            String::from_utf8_lossy(kmer)
        )));
    }

    if alt.len() < 2 || kmer[0] != alt[0] || kmer[kmer.len() - 1] != alt[alt.len() - 1] {
        return Err(SimulationError::resource(format!(
            "alternative {} must share its first and last base with k-mer {}",
            String::from_utf8_lossy(alt),
            String::from_utf8_lossy(kmer)
        )));
    }

    if kmer == alt {
        return Ok(representation_of(kmer));
    }

    let kmer_inner = &kmer[1..kmer.len() - 1];
    let alt_inner = &alt[1..alt.len() - 1];

    let mut slots: Vec<Vec<u8>> = vec![Vec::new(); kmer_inner.len()];
    let mut leading = Vec::new();
    let (mut slot_i, mut alt_i) = (0, 0);

    for op in alignment::align(alt_inner, kmer_inner) {
        match op {
            CigarOp::Match | CigarOp::Mismatch => {
                slots[slot_i].push(alt_inner[alt_i]);
                slot_i += 1;
                alt_i += 1;
            }
            CigarOp::Deletion => slot_i += 1,
            CigarOp::Insertion => {
                match slot_i {
                    0 => leading.push(alt_inner[alt_i]),
                    _ => slots[slot_i - 1].push(alt_inner[alt_i]),
                }
                alt_i += 1;
            }
        }
    }

    // Insertions before the first interior base cannot go in the first slot
    // (it must stay the first base), so they lead the first interior slot.
    if !leading.is_empty() {
        leading.append(&mut slots[0]);
        slots[0] = leading;
    }

    let mut representation = Vec::with_capacity(kmer.len());
    representation.push(Slot::Single(kmer[0]));
    representation.extend(slots.iter().map(|slot| Slot::from_bytes(slot)));
    representation.push(Slot::Single(kmer[kmer.len() - 1]));

    Ok(representation)
}

//=============//
// Error table //
//=============//

/// The alternatives for each k-mer of a trained model.
#[derive(Clone, Debug)]
pub struct ErrorTable {
    /// The length of every k-mer in the table.
    kmer_size: usize,

    /// Alternatives and their probabilities, per k-mer.
    alternatives: HashMap<Vec<u8>, Vec<(KmerRepresentation, f64)>>,
}

impl ErrorTable {
    /// The length of every k-mer in the table.
    pub fn kmer_size(&self) -> usize {
        self.kmer_size
    }

    /// The number of k-mers in the table.
    pub fn len(&self) -> usize {
        self.alternatives.len()
    }

    /// Whether the table holds no k-mers.
    pub fn is_empty(&self) -> bool {
        self.alternatives.is_empty()
    }

    /// The alternatives listed for a k-mer, if any.
    pub fn alternatives(&self, kmer: &[u8]) -> Option<&[(KmerRepresentation, f64)]> {
        self.alternatives.get(kmer).map(Vec::as_slice)
    }

    /// Parses a table from a reader.
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self, SimulationError> {
        let mut kmer_size = None;
        let mut alternatives = HashMap::new();

        for (i, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let line_number = i + 1;
            let (kmer, entries) = parse_line(line).map_err(|reason| {
                SimulationError::resource(format!(
                    "error model line {} is malformed: {}",
                    line_number, reason
                ))
            })?;

            match kmer_size {
                None => kmer_size = Some(kmer.len()),
                Some(k) if k != kmer.len() => {
                    return Err(SimulationError::resource(format!(
                        "error model line {} has a {}-mer but previous lines have {}-mers",
                        line_number,
                        kmer.len(),
                        k
                    )))
                }
                Some(_) => {}
            }

            alternatives.insert(kmer, entries);
        }

        let kmer_size = kmer_size
            .ok_or_else(|| SimulationError::resource("error model does not contain any k-mers"))?;

        Ok(ErrorTable {
            kmer_size,
            alternatives,
        })
    }
}

/// Parses one `kmer,prob;alt,prob;...` line.
fn parse_line(line: &str) -> Result<(Vec<u8>, Vec<(KmerRepresentation, f64)>), String> {
    let mut kmer: Option<Vec<u8>> = None;
    let mut entries = Vec::new();
    let mut total = 0.0;

    for part in line.split(';').filter(|part| !part.is_empty()) {
        let (sequence, probability) = part
            .split_once(',')
            .ok_or_else(|| format!("expected `sequence,probability`, found `{}`", part))?;
        let probability = probability
            .trim()
            .parse::<f64>()
            .map_err(|_| format!("could not parse probability `{}`", probability))?;
        if !(0.0..=1.0).contains(&probability) {
            return Err(format!("probability {} is not between 0 and 1", probability));
        }

        let sequence = sequence.trim().as_bytes().to_vec();
        if sequence.iter().any(|b| !b"ACGT".contains(b)) {
            return Err(format!(
                "`{}` is not a DNA sequence",
                String::from_utf8_lossy(&sequence)
            ));
        }

        let representation = match kmer.as_deref() {
            Some(kmer) => align_kmers(kmer, &sequence).map_err(|e| e.to_string())?,
            None => representation_of(&sequence),
        };

        if kmer.is_none() {
            if sequence.is_empty() {
                return Err(String::from("the k-mer is empty"));
            }
            kmer = Some(sequence);
        }

        total += probability;
        entries.push((representation, probability));
    }

    if total > 1.0 + PROBABILITY_SLACK {
        return Err(format!("probabilities sum to {} (more than 1)", total));
    }

    let kmer = kmer.ok_or_else(|| String::from("the line has no entries"))?;
    Ok((kmer, entries))
}

//=============//
// Error model //
//=============//

/// How errors are added to k-mers.
#[derive(Clone, Debug)]
pub enum ErrorModel {
    /// Every mutation is a single random edit (k = 1).
    Random,

    /// K-mers are never changed (k = 1).
    Perfect,

    /// Mutations follow a trained table.
    Trained(ErrorTable),
}

impl ErrorModel {
    /// Loads an error model: `random`, `perfect`, a path to a model file, or
    /// the name of a preset in the model directory.
    pub fn load(name_or_path: &str, model_dir: Option<&Path>) -> anyhow::Result<Self> {
        match name_or_path {
            "random" => {
                info!("Using a random error model.");
                Ok(ErrorModel::Random)
            }
            "perfect" => {
                info!("Using a perfect error model.");
                Ok(ErrorModel::Perfect)
            }
            _ => {
                let path = match Path::new(name_or_path).is_file() {
                    true => Path::new(name_or_path).to_path_buf(),
                    false => resolve_preset("error_models", name_or_path, model_dir)?,
                };

                info!("Loading error model from {}.", path.display());
                let reader = open_maybe_gzipped(&path)
                    .with_context(|| format!("opening error model: {}", path.display()))?;
                let table = ErrorTable::from_reader(reader)
                    .with_context(|| format!("loading error model: {}", path.display()))?;
                debug!(
                    "Loaded {} {}-mers from the error model.",
                    table.len(),
                    table.kmer_size()
                );

                Ok(ErrorModel::Trained(table))
            }
        }
    }

    /// The k-mer width the model works on.
    pub fn kmer_size(&self) -> usize {
        match self {
            ErrorModel::Random | ErrorModel::Perfect => 1,
            ErrorModel::Trained(table) => table.kmer_size(),
        }
    }

    /// Whether this model can ever introduce an error.
    pub fn is_perfect(&self) -> bool {
        matches!(self, ErrorModel::Perfect)
    }

    /// Mutates a k-mer. K-mers unknown to a trained table (and every k-mer in
    /// the random model) receive a single random edit. Known k-mers draw one
    /// of their alternatives, with any leftover probability spent on a random
    /// edit.
    pub fn mutate<R: Rng + ?Sized>(&self, kmer: &[u8], rng: &mut R) -> KmerRepresentation {
        match self {
            ErrorModel::Perfect => representation_of(kmer),
            ErrorModel::Random => random_edit(kmer, rng),
            ErrorModel::Trained(table) => match table.alternatives(kmer) {
                None => random_edit(kmer, rng),
                Some(alternatives) => {
                    let draw = rng.gen::<f64>();
                    let mut cumulative = 0.0;
                    for (representation, probability) in alternatives {
                        cumulative += probability;
                        if draw < cumulative {
                            return representation.clone();
                        }
                    }
                    random_edit(kmer, rng)
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::io::Cursor;

    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    fn slots(parts: &[&str]) -> KmerRepresentation {
        parts.iter().map(|p| Slot::from_bytes(p.as_bytes())).collect()
    }

    #[test]
    fn test_slot_bytes() {
        assert_eq!(Slot::from_bytes(b""), Slot::Deleted);
        assert_eq!(Slot::from_bytes(b"A"), Slot::Single(b'A'));
        assert_eq!(Slot::from_bytes(b"AC"), Slot::Inserted(b"AC".to_vec()));
        assert_eq!(Slot::Inserted(b"ACG".to_vec()).len(), 3);
        assert!(Slot::Single(b'A').is_base(b'A'));
        assert!(!Slot::Inserted(b"AC".to_vec()).is_base(b'A'));
    }

    #[test]
    fn test_align_kmers_identical() {
        for kmer in [&b"ACG"[..], b"ACGT", b"AAAAAAA", b"TGCATGCA"] {
            assert_eq!(align_kmers(kmer, kmer).unwrap(), representation_of(kmer));
        }
    }

    #[test]
    fn test_align_kmers_insertions() {
        assert_eq!(
            align_kmers(b"ACGT", b"ATCGT").unwrap(),
            slots(&["A", "TC", "G", "T"])
        );
        assert_eq!(
            align_kmers(b"ACGT", b"ACGCT").unwrap(),
            slots(&["A", "C", "GC", "T"])
        );
        assert_eq!(
            align_kmers(b"AAA", b"AAAAAAAAAAAAAA").unwrap(),
            slots(&["A", "AAAAAAAAAAAA", "A"])
        );
    }

    #[test]
    fn test_align_kmers_deletions() {
        let mut expected = vec!["A"];
        expected.extend(std::iter::repeat("").take(11));
        expected.push("G");
        assert_eq!(
            align_kmers(b"ACGACTAGCTACG", b"AG").unwrap(),
            slots(&expected)
        );
        assert_eq!(align_kmers(b"ACGT", b"AGT").unwrap(), slots(&["A", "", "G", "T"]));
    }

    #[test]
    fn test_align_kmers_substitution() {
        assert_eq!(
            align_kmers(b"ACGTA", b"ACCTA").unwrap(),
            slots(&["A", "C", "C", "T", "A"])
        );
    }

    #[test]
    fn test_align_kmers_keeps_ends_and_bytes() {
        let kmer = b"ACGTACG";
        for alt in [&b"ACG"[..], b"AG", b"ATTTTTTTTG", b"ACGGG", b"AGGGGGCG"] {
            let representation = align_kmers(kmer, alt).unwrap();
            assert_eq!(representation.len(), kmer.len());
            assert_eq!(representation[0], Slot::Single(b'A'));
            assert_eq!(representation[kmer.len() - 1], Slot::Single(b'G'));
            assert_eq!(representation_bytes(&representation), alt.to_vec());
        }
    }

    #[test]
    fn test_align_kmers_rejects_invalid_inputs() {
        assert!(align_kmers(b"AC", b"AC").is_err());
        assert!(align_kmers(b"AAA", b"A").is_err());
        assert!(align_kmers(b"ACGTA", b"ACGTC").is_err());
    }

    #[test]
    fn test_random_edit_variety() {
        let mut rng = StdRng::seed_from_u64(0);
        for (kmer, expected) in [(&b"A"[..], 11), (b"AC", 22), (b"ACG", 33), (b"ACGT", 44)] {
            let variants: HashSet<KmerRepresentation> =
                (0..10_000).map(|_| random_edit(kmer, &mut rng)).collect();
            assert_eq!(variants.len(), expected);
            assert!(!variants.contains(&representation_of(kmer)));
        }
    }

    #[test]
    fn test_perfect_model_never_changes() {
        let mut rng = StdRng::seed_from_u64(0);
        let model = ErrorModel::Perfect;
        for kmer in [&b"A"[..], b"ACGT", b"TTTT"] {
            assert_eq!(model.mutate(kmer, &mut rng), representation_of(kmer));
        }
    }

    #[test]
    fn test_random_model_always_changes() {
        let mut rng = StdRng::seed_from_u64(0);
        let model = ErrorModel::Random;
        assert_eq!(model.kmer_size(), 1);
        for _ in 0..1000 {
            assert_ne!(model.mutate(b"G", &mut rng), representation_of(b"G"));
        }
    }

    #[test]
    fn test_trained_model() {
        let table = "\
            ACAC,1.0\n\
            ACAG,0.5;ACGG,0.5\n\
            ACAT,0.0\n";
        let model = ErrorModel::Trained(ErrorTable::from_reader(Cursor::new(table)).unwrap());
        assert_eq!(model.kmer_size(), 4);

        let mut rng = StdRng::seed_from_u64(0);
        for _ in 0..1000 {
            // Never wrong.
            assert_eq!(model.mutate(b"ACAC", &mut rng), representation_of(b"ACAC"));

            // Half the time right, half the time a known substitution.
            let acag = model.mutate(b"ACAG", &mut rng);
            assert!(acag == representation_of(b"ACAG") || acag == slots(&["A", "C", "G", "G"]));

            // Always a random change.
            assert_ne!(model.mutate(b"ACAT", &mut rng), representation_of(b"ACAT"));

            // Not in the table, so also always a random change.
            assert_ne!(model.mutate(b"GGGG", &mut rng), representation_of(b"GGGG"));
        }
    }

    #[test]
    fn test_trained_model_rejects_inconsistent_kmer_sizes() {
        let table = "ACAC,1.0\nACAGT,1.0\n";
        let err = ErrorTable::from_reader(Cursor::new(table)).unwrap_err();
        assert!(matches!(err, SimulationError::Resource(_)));
    }

    #[test]
    fn test_trained_model_rejects_malformed_lines() {
        for table in [
            "ACAC\n",
            "ACAC,abc\n",
            "ACAC,0.5;ACGC\n",
            "ACAC,0.9;ACGC,0.9\n",
            "AXAC,1.0\n",
            "",
        ] {
            assert!(
                ErrorTable::from_reader(Cursor::new(table)).is_err(),
                "{:?} should not load",
                table
            );
        }
    }

    #[test]
    fn test_load_missing_preset() {
        let dir = std::env::temp_dir().join("lrsim-missing-models");
        assert!(ErrorModel::load("no_such_model", Some(&dir)).is_err());
        assert!(matches!(
            ErrorModel::load("random", None).unwrap(),
            ErrorModel::Random
        ));
        assert!(ErrorModel::load("perfect", None).unwrap().is_perfect());
    }
}
