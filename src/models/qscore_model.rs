//! Quality scores, chosen from the alignment context around each read base.
//!
//! A quality model maps a CIGAR context (for example `=X=` or `==I==`) to a
//! distribution of qscores. Contexts are centred on the base being scored and
//! always have an odd number of read-consuming operations. When a context is
//! missing from the model, one operation is trimmed from each end (along with
//! any deletions left exposed) and the lookup is tried again. The single
//! operation contexts `=`, `X` and `I` are always present, so the lookup
//! always ends.
//!
//! Model files have one context per line:
//!
//! ```text
//! =X=;1234;3:0.25,5:0.5,7:0.25,
//! ```
//!
//! giving the context, the number of times it was seen and its qscore
//! distribution. A line starting with `overall` is ignored.

use std::collections::HashMap;
use std::io::BufRead;
use std::path::Path;

use anyhow::Context;
use rand::Rng;
use rand_distr::Distribution;
use rand_distr::WeightedIndex;
use tracing::debug;
use tracing::info;

use crate::errors::SimulationError;
use crate::models::distributions::qscore_to_error_probability;
use crate::models::resolve_preset;
use crate::simulate::settings;
use crate::utils::alignment;
use crate::utils::cigar;
use crate::utils::cigar::CigarOp;
use crate::utils::formats::open_maybe_gzipped;

/// Offset between a qscore and its FASTQ character.
const PHRED_OFFSET: u8 = 33;

/// The highest qscore that can be written as a printable character.
const MAX_QSCORE: u8 = 93;

/// Converts a qscore to its FASTQ character (Phred+33).
pub fn qscore_to_char(qscore: u8) -> u8 {
    qscore.min(MAX_QSCORE) + PHRED_OFFSET
}

/// Converts a FASTQ quality character (Phred+33) to its qscore.
pub fn char_to_qscore(c: u8) -> u8 {
    c.saturating_sub(PHRED_OFFSET)
}

//=====================//
// Qscore distribution //
//=====================//

/// A discrete distribution over qscores.
#[derive(Clone, Debug)]
struct QScoreDistribution {
    qscores: Vec<u8>,
    weights: WeightedIndex<f64>,
}

impl QScoreDistribution {
    fn new(qscores: Vec<u8>, probabilities: &[f64]) -> Result<Self, String> {
        let weights = WeightedIndex::new(probabilities)
            .map_err(|e| format!("invalid qscore probabilities: {}", e))?;
        Ok(QScoreDistribution { qscores, weights })
    }

    fn uniform(min: u8, max: u8) -> Option<Self> {
        let qscores: Vec<u8> = (min..=max).collect();
        let weights = WeightedIndex::new(vec![1.0; qscores.len()]).ok()?;
        Some(QScoreDistribution { qscores, weights })
    }

    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> u8 {
        self.qscores[self.weights.sample(rng)]
    }
}

//==============//
// Qscore table //
//==============//

/// Qscore distributions keyed by CIGAR context.
#[derive(Clone, Debug)]
pub struct QScoreTable {
    /// The widest context in the table, counted in read-consuming operations.
    kmer_size: usize,

    distributions: HashMap<Vec<CigarOp>, QScoreDistribution>,
}

/// Removes deletions from both ends of a context.
fn trim_deletions(mut context: &[CigarOp]) -> &[CigarOp] {
    while let [CigarOp::Deletion, rest @ ..] = context {
        context = rest;
    }
    while let [rest @ .., CigarOp::Deletion] = context {
        context = rest;
    }
    context
}

/// Number of read-consuming operations in a context.
fn read_length(context: &[CigarOp]) -> usize {
    context.iter().filter(|op| op.consumes_read()).count()
}

impl QScoreTable {
    /// The widest context in the table, counted in read-consuming operations.
    pub fn kmer_size(&self) -> usize {
        self.kmer_size
    }

    /// The qscore ranges of the ideal model: the longer the run of matches
    /// around a base, the higher its quality.
    pub fn ideal() -> Self {
        let ranges: [(&str, u8, u8); 6] = [
            ("X", 1, 3),
            ("I", 1, 3),
            ("=", 4, 10),
            ("===", 11, 20),
            ("=====", 21, 30),
            ("=======", 31, 40),
        ];

        let distributions = ranges
            .iter()
            .filter_map(|(context, min, max)| {
                Some((
                    cigar::parse_columns(context)?,
                    QScoreDistribution::uniform(*min, *max)?,
                ))
            })
            .collect();

        QScoreTable {
            kmer_size: 7,
            distributions,
        }
    }

    /// Parses a table from a reader.
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self, SimulationError> {
        let mut kmer_size = 1;
        let mut distributions = HashMap::new();

        for (i, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() || line.starts_with("overall") {
                continue;
            }

            let (context, distribution) = parse_line(line).map_err(|reason| {
                SimulationError::resource(format!(
                    "qscore model line {} is malformed: {}",
                    i + 1,
                    reason
                ))
            })?;

            kmer_size = kmer_size.max(read_length(&context));
            distributions.insert(context, distribution);
        }

        for required in [CigarOp::Match, CigarOp::Mismatch, CigarOp::Insertion] {
            if !distributions.contains_key(&vec![required]) {
                return Err(SimulationError::resource(format!(
                    "qscore model is missing the `{}` context",
                    required
                )));
            }
        }

        Ok(QScoreTable {
            kmer_size,
            distributions,
        })
    }

    /// Draws a qscore for the context, shrinking the context until the table
    /// knows it.
    pub fn lookup<R: Rng + ?Sized>(&self, context: &[CigarOp], rng: &mut R) -> u8 {
        let mut context = context;

        loop {
            debug_assert!(read_length(context) % 2 == 1, "contexts have odd length");

            if let Some(distribution) = self.distributions.get(context) {
                return distribution.sample(rng);
            }

            match context {
                [_, inner @ .., _] if !inner.is_empty() => context = trim_deletions(inner),
                _ => {
                    debug_assert!(false, "single-operation contexts are always present");
                    return settings::RANDOM_QSCORE_MIN;
                }
            }
        }
    }
}

/// Parses one `cigar;count;q:prob,q:prob,...` line.
fn parse_line(line: &str) -> Result<(Vec<CigarOp>, QScoreDistribution), String> {
    let parts: Vec<&str> = line.split(';').collect();
    if parts.len() < 3 {
        return Err(format!("expected 3 `;`-separated fields, found {}", parts.len()));
    }

    let context = cigar::parse_columns(parts[0])
        .ok_or_else(|| format!("`{}` is not a CIGAR context", parts[0]))?;
    if context.is_empty()
        || context.first() == Some(&CigarOp::Deletion)
        || context.last() == Some(&CigarOp::Deletion)
        || read_length(&context) % 2 == 0
    {
        return Err(format!(
            "`{}` must not start or end with a deletion and must have an odd length",
            parts[0]
        ));
    }

    parts[1]
        .trim()
        .parse::<u64>()
        .map_err(|_| format!("could not parse count `{}`", parts[1]))?;

    let mut qscores = Vec::new();
    let mut probabilities = Vec::new();
    for pair in parts[2].split(',').filter(|pair| !pair.trim().is_empty()) {
        let (qscore, probability) = pair
            .split_once(':')
            .ok_or_else(|| format!("expected `qscore:probability`, found `{}`", pair))?;
        qscores.push(
            qscore
                .trim()
                .parse::<u8>()
                .map_err(|_| format!("could not parse qscore `{}`", qscore))?,
        );
        probabilities.push(
            probability
                .trim()
                .parse::<f64>()
                .map_err(|_| format!("could not parse probability `{}`", probability))?,
        );
    }

    let distribution = QScoreDistribution::new(qscores, &probabilities)?;
    Ok((context, distribution))
}

//==============//
// Qscore model //
//==============//

/// How qscores are assigned to read bases.
#[derive(Clone, Debug)]
pub enum QScoreModel {
    /// Uniformly random qscores, regardless of context.
    Random,

    /// Qscores that reflect the read's true accuracy.
    Ideal(QScoreTable),

    /// Qscores from a trained table.
    Trained(QScoreTable),
}

impl QScoreModel {
    /// Loads a qscore model: `random`, `ideal`, a path to a model file, or the
    /// name of a preset in the model directory.
    pub fn load(name_or_path: &str, model_dir: Option<&Path>) -> anyhow::Result<Self> {
        match name_or_path {
            "random" => {
                info!("Using a random qscore model.");
                Ok(QScoreModel::Random)
            }
            "ideal" => {
                info!("Using an ideal qscore model.");
                Ok(QScoreModel::Ideal(QScoreTable::ideal()))
            }
            _ => {
                let path = match Path::new(name_or_path).is_file() {
                    true => Path::new(name_or_path).to_path_buf(),
                    false => resolve_preset("qscore_models", name_or_path, model_dir)?,
                };

                info!("Loading qscore model from {}.", path.display());
                let reader = open_maybe_gzipped(&path)
                    .with_context(|| format!("opening qscore model: {}", path.display()))?;
                let table = QScoreTable::from_reader(reader)
                    .with_context(|| format!("loading qscore model: {}", path.display()))?;
                debug!("Qscore model contexts span up to {} bases.", table.kmer_size());

                Ok(QScoreModel::Trained(table))
            }
        }
    }

    /// The widest context the model uses, counted in read bases.
    pub fn kmer_size(&self) -> usize {
        match self {
            QScoreModel::Random => 1,
            QScoreModel::Ideal(table) | QScoreModel::Trained(table) => table.kmer_size(),
        }
    }

    /// Draws a qscore for a base with the given alignment context.
    pub fn lookup<R: Rng + ?Sized>(&self, context: &[CigarOp], rng: &mut R) -> u8 {
        match self {
            QScoreModel::Random => {
                rng.gen_range(settings::RANDOM_QSCORE_MIN..=settings::RANDOM_QSCORE_MAX)
            }
            QScoreModel::Ideal(table) | QScoreModel::Trained(table) => table.lookup(context, rng),
        }
    }
}

//====================//
// Quality assignment //
//====================//

/// Qualities assigned to a read, along with its identity to the fragment it
/// came from.
#[derive(Clone, Debug, PartialEq)]
pub struct QualityAssignment {
    /// FASTQ quality characters, one per read base.
    pub qualities: Vec<u8>,

    /// Identity of the read to its fragment (matches over alignment columns).
    pub identity: f64,

    /// The identity implied by the qualities (one minus the mean error
    /// probability).
    pub qscore_identity: f64,
}

/// Aligns `read` to `fragment` and assigns every read base a quality using
/// the context of alignment columns around it. Contexts span up to the model's
/// width and shrink symmetrically near the ends of the read.
pub fn assign_qualities<R: Rng + ?Sized>(
    read: &[u8],
    fragment: &[u8],
    model: &QScoreModel,
    rng: &mut R,
) -> QualityAssignment {
    if read.is_empty() {
        return QualityAssignment {
            qualities: Vec::new(),
            identity: 0.0,
            qscore_identity: 0.0,
        };
    }

    let columns = alignment::align(read, fragment);
    let read_columns: Vec<usize> = columns
        .iter()
        .enumerate()
        .filter(|(_, op)| op.consumes_read())
        .map(|(i, _)| i)
        .collect();
    debug_assert_eq!(read_columns.len(), read.len());

    let margin = (model.kmer_size().max(1) - 1) / 2;
    let mut qualities = Vec::with_capacity(read.len());
    let mut error_sum = 0.0;

    for i in 0..read.len() {
        let m = margin.min(i).min(read.len() - 1 - i);
        let context = match (read_columns.get(i - m), read_columns.get(i + m)) {
            (Some(start), Some(end)) => &columns[*start..=*end],
            // Only reachable if the alignment lost read bases.
            _ => std::slice::from_ref(&CigarOp::Match),
        };
        let qscore = model.lookup(context, rng);

        error_sum += qscore_to_error_probability(qscore as f64);
        qualities.push(qscore_to_char(qscore));
    }

    QualityAssignment {
        qualities,
        identity: cigar::identity(&columns),
        qscore_identity: 1.0 - error_sum / read.len() as f64,
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;
    use crate::utils::cigar::parse_columns;
    use crate::utils::sequence::random_sequence;

    fn ops(s: &str) -> Vec<CigarOp> {
        parse_columns(s).unwrap()
    }

    fn table(contents: &str) -> QScoreTable {
        QScoreTable::from_reader(Cursor::new(contents)).unwrap()
    }

    #[test]
    fn test_quality_characters() {
        assert_eq!(qscore_to_char(0), b'!');
        assert_eq!(qscore_to_char(40), b'I');
        assert_eq!(qscore_to_char(200), b'~');
        assert_eq!(char_to_qscore(b'I'), 40);
    }

    #[test]
    fn test_trim_deletions() {
        assert_eq!(trim_deletions(&ops("DD=XD")), ops("=X").as_slice());
        assert_eq!(trim_deletions(&ops("=")), ops("=").as_slice());
        assert!(trim_deletions(&ops("DD")).is_empty());
    }

    #[test]
    fn test_load_table() {
        let t = table(
            "overall;100;1:0.5,2:0.5,\n\
             =;50;10:1.0,\n\
             X;20;3:1.0,\n\
             I;20;4:1.0,\n\
             =X=;5;5:0.5,6:0.5,\n\
             =D=X==;5;7:1.0,\n",
        );
        assert_eq!(t.kmer_size(), 5);
        assert_eq!(t.distributions.len(), 5);
    }

    #[test]
    fn test_lookup_exact_and_shrinking() {
        let t = table(
            "=;50;10:1.0,\n\
             X;20;3:1.0,\n\
             I;20;4:1.0,\n\
             =X=;5;5:1.0,\n",
        );
        let mut rng = StdRng::seed_from_u64(0);

        assert_eq!(t.lookup(&ops("=X="), &mut rng), 5);
        // Unknown contexts shrink to the centre.
        assert_eq!(t.lookup(&ops("==X=="), &mut rng), 5);
        assert_eq!(t.lookup(&ops("X=X=X"), &mut rng), 5);
        assert_eq!(t.lookup(&ops("X===X"), &mut rng), 10);
        assert_eq!(t.lookup(&ops("=X===X="), &mut rng), 10);
        assert_eq!(t.lookup(&ops("=I="), &mut rng), 4);
        // Deletions exposed by trimming are removed as well.
        assert_eq!(t.lookup(&ops("XD=DX"), &mut rng), 10);
        assert_eq!(t.lookup(&ops("=DDX="), &mut rng), 3);
    }

    #[test]
    fn test_lookup_terminates_for_every_small_context() {
        let t = table("=;1;10:1.0,\nX;1;3:1.0,\nI;1;4:1.0,\n");
        let mut rng = StdRng::seed_from_u64(0);
        let symbols = [CigarOp::Match, CigarOp::Mismatch, CigarOp::Insertion];
        for a in symbols {
            for b in symbols {
                for c in symbols {
                    let q = t.lookup(&[a, b, c], &mut rng);
                    assert!([3, 4, 10].contains(&q));
                    let q = t.lookup(&[a, CigarOp::Deletion, b, CigarOp::Deletion, c], &mut rng);
                    assert!([3, 4, 10].contains(&q));
                }
            }
        }
    }

    #[test]
    fn test_load_rejects_bad_tables() {
        for contents in [
            // Missing the required single-operation contexts.
            "=;1;10:1.0,\n",
            // Malformed lines.
            "=;1;10:1.0,\nX;1;3:1.0,\nI;1\n",
            "=;1;10:1.0,\nX;1;3:1.0,\nI;1;abc:1.0,\n",
            "=;1;10:1.0,\nX;1;3:1.0,\nI;1;4:x,\n",
            "=;1;10:1.0,\nX;1;3:1.0,\nI;1;4:1.0,\nD=;1;4:1.0,\n",
            "=;1;10:1.0,\nX;1;3:1.0,\nI;1;4:1.0,\n==;1;4:1.0,\n",
            "=;1;10:1.0,\nX;1;3:1.0,\nI;1;4:1.0,\n=M=;1;4:1.0,\n",
        ] {
            assert!(
                QScoreTable::from_reader(Cursor::new(contents)).is_err(),
                "{:?} should not load",
                contents
            );
        }
    }

    #[test]
    fn test_random_model_range() {
        let model = QScoreModel::Random;
        let mut rng = StdRng::seed_from_u64(0);
        for _ in 0..1000 {
            let q = model.lookup(&ops("X"), &mut rng);
            assert!((settings::RANDOM_QSCORE_MIN..=settings::RANDOM_QSCORE_MAX).contains(&q));
        }
    }

    #[test]
    fn test_ideal_model() {
        let model = QScoreModel::Ideal(QScoreTable::ideal());
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(model.kmer_size(), 7);
        for _ in 0..100 {
            assert!(model.lookup(&ops("X"), &mut rng) <= 3);
            assert!((31..=40).contains(&model.lookup(&ops("======="), &mut rng)));
            assert!((21..=30).contains(&model.lookup(&ops("X=====X"), &mut rng)));
            assert!((4..=10).contains(&model.lookup(&ops("=X=X="), &mut rng)));
        }
    }

    #[test]
    fn test_assign_qualities_perfect_read() {
        let mut rng = StdRng::seed_from_u64(0);
        let fragment = random_sequence(200, &mut rng);
        let model = QScoreModel::Ideal(QScoreTable::ideal());

        let assignment = assign_qualities(&fragment, &fragment, &model, &mut rng);
        assert_eq!(assignment.qualities.len(), fragment.len());
        assert_eq!(assignment.identity, 1.0);
        assert!(assignment.qscore_identity > 0.9);

        // The middle of a perfect read gets the best qualities, the ends less.
        let middle = char_to_qscore(assignment.qualities[100]);
        assert!((31..=40).contains(&middle));
        let first = char_to_qscore(assignment.qualities[0]);
        assert!((4..=10).contains(&first));
    }

    #[test]
    fn test_assign_qualities_with_errors() {
        let mut rng = StdRng::seed_from_u64(0);
        let fragment = random_sequence(300, &mut rng);
        let mut read = fragment.clone();
        read[150] = crate::utils::sequence::random_different_base(read[150], &mut rng);
        read.insert(50, b'A');

        let model = QScoreModel::Ideal(QScoreTable::ideal());
        let assignment = assign_qualities(&read, &fragment, &model, &mut rng);
        assert_eq!(assignment.qualities.len(), read.len());
        assert!(assignment.identity < 1.0 && assignment.identity > 0.98);
    }

    #[test]
    fn test_assign_qualities_empty_read() {
        let mut rng = StdRng::seed_from_u64(0);
        let assignment = assign_qualities(b"", b"ACGT", &QScoreModel::Random, &mut rng);
        assert!(assignment.qualities.is_empty());
        assert_eq!(assignment.identity, 0.0);
    }

    #[test]
    fn test_assign_qualities_long_read() {
        let mut rng = StdRng::seed_from_u64(4);
        let fragment = random_sequence(15_000, &mut rng);
        let model = QScoreModel::Ideal(QScoreTable::ideal());

        let assignment = assign_qualities(&fragment, &fragment, &model, &mut rng);
        assert_eq!(assignment.qualities.len(), fragment.len());
        assert_eq!(assignment.identity, 1.0);
        assert!((31..=40).contains(&char_to_qscore(assignment.qualities[7_500])));
    }
}
