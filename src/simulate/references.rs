//! The reference sequences that fragments are drawn from.
//!
//! Contig headers may carry two annotations, matched case-insensitively
//! anywhere in the description:
//!
//! * `depth=<float>` scales how often the contig is sampled (default 1.0).
//! * `circular=true` marks the contig as circular, so fragments may wrap
//!   around its origin.

use std::io::BufRead;
use std::path::Path;

use anyhow::Context;
use indexmap::IndexMap;
use noodles::fasta;
use regex::Regex;
use tracing::info;
use tracing::warn;

use crate::errors::SimulationError;
use crate::utils::display::formatted_count;
use crate::utils::formats;
use crate::utils::sequence::reverse_complement;

/// A single reference contig.
#[derive(Clone, Debug)]
pub struct Contig {
    name: String,
    sequence: Vec<u8>,
    reverse_complement: Vec<u8>,
    depth: f64,
    circular: bool,
}

impl Contig {
    /// Creates a contig. The sequence is uppercased and anything other than
    /// `A`, `C`, `G` or `T` becomes `N`.
    pub fn new<S: Into<String>>(
        name: S,
        sequence: &[u8],
        depth: f64,
        circular: bool,
    ) -> Result<Self, SimulationError> {
        let name = name.into();

        if !(depth.is_finite() && depth >= 0.0) {
            return Err(SimulationError::configuration(format!(
                "contig `{}` has an invalid depth of {}",
                name, depth
            )));
        }

        let sequence: Vec<u8> = sequence
            .iter()
            .map(|base| match base.to_ascii_uppercase() {
                b @ (b'A' | b'C' | b'G' | b'T') => b,
                _ => b'N',
            })
            .collect();

        let reverse_complement = reverse_complement(&sequence).ok_or_else(|| {
            SimulationError::configuration(format!("could not reverse complement `{}`", name))
        })?;

        Ok(Contig {
            name,
            sequence,
            reverse_complement,
            depth,
            circular,
        })
    }

    /// The contig's name (the first word of its header).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The forward strand.
    pub fn sequence(&self) -> &[u8] {
        &self.sequence
    }

    /// The reverse strand, read 5' to 3'.
    pub fn reverse_complement(&self) -> &[u8] {
        &self.reverse_complement
    }

    /// The relative depth of this contig.
    pub fn depth(&self) -> f64 {
        self.depth
    }

    /// Sets the relative depth of this contig.
    pub fn set_depth(&mut self, depth: f64) {
        self.depth = depth;
    }

    /// Whether the contig is circular.
    pub fn is_circular(&self) -> bool {
        self.circular
    }

    /// The length of the contig.
    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    /// Whether the contig has no bases.
    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }
}

/// Parses the `depth=` and `circular=` annotations from a FASTA header
/// description.
pub struct HeaderAnnotations {
    depth: Regex,
    circular: Regex,
}

impl HeaderAnnotations {
    /// Compiles the annotation patterns.
    pub fn new() -> Result<Self, regex::Error> {
        Ok(HeaderAnnotations {
            depth: Regex::new(r"(?i)depth=([0-9]*\.?[0-9]+(?:e[-+]?[0-9]+)?)")?,
            circular: Regex::new(r"(?i)circular=true")?,
        })
    }

    /// The depth given in the description, or 1.0.
    pub fn depth(&self, description: &str) -> f64 {
        self.depth
            .captures(description)
            .and_then(|captures| captures.get(1))
            .and_then(|m| m.as_str().parse::<f64>().ok())
            .unwrap_or(1.0)
    }

    /// Whether the description marks the contig as circular.
    pub fn circular(&self, description: &str) -> bool {
        self.circular.is_match(description)
    }
}

/// All reference contigs, in file order.
#[derive(Clone, Debug)]
pub struct References {
    contigs: IndexMap<String, Contig>,
}

impl References {
    /// Loads every contig from a (possibly gzipped) FASTA file.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        info!("Loading reference from {}.", path.display());

        let reader = formats::fasta::open(path)?;
        let references = Self::from_reader(reader)
            .with_context(|| format!("reading reference: {}", path.display()))?;

        for contig in references.iter() {
            info!(
                "  [*] {}: {} bp, {}, {:.2}x depth",
                contig.name(),
                formatted_count(contig.len()),
                if contig.is_circular() { "circular" } else { "linear" },
                contig.depth()
            );
        }

        Ok(references)
    }

    /// Reads every contig from a FASTA reader.
    pub fn from_reader<R: BufRead>(mut reader: fasta::Reader<R>) -> anyhow::Result<Self> {
        let annotations = HeaderAnnotations::new()?;
        let mut contigs = Vec::new();

        for result in reader.records() {
            let record = result?;
            let description = record.description().unwrap_or_default();

            contigs.push(Contig::new(
                record.name(),
                record.sequence().as_ref(),
                annotations.depth(description),
                annotations.circular(description),
            )?);
        }

        Ok(Self::from_contigs(contigs)?)
    }

    /// Collects contigs, rejecting empty and duplicate ones.
    pub fn from_contigs(contigs: Vec<Contig>) -> Result<Self, SimulationError> {
        let mut map = IndexMap::new();

        for contig in contigs {
            if contig.is_empty() {
                warn!("Skipping empty contig `{}`.", contig.name());
                continue;
            }

            if map.contains_key(contig.name()) {
                return Err(SimulationError::configuration(format!(
                    "duplicate contig name in reference: `{}`",
                    contig.name()
                )));
            }

            map.insert(contig.name().to_string(), contig);
        }

        if map.is_empty() {
            return Err(SimulationError::configuration(
                "the reference contains no sequences",
            ));
        }

        Ok(References { contigs: map })
    }

    /// The summed length of every contig.
    pub fn total_length(&self) -> usize {
        self.contigs.values().map(Contig::len).sum()
    }

    /// The number of contigs.
    pub fn len(&self) -> usize {
        self.contigs.len()
    }

    /// Whether there are no contigs (never true for a loaded reference).
    pub fn is_empty(&self) -> bool {
        self.contigs.is_empty()
    }

    /// Looks up a contig by name.
    pub fn get(&self, name: &str) -> Option<&Contig> {
        self.contigs.get(name)
    }

    /// Looks up a contig by position.
    pub fn get_index(&self, index: usize) -> Option<&Contig> {
        self.contigs.get_index(index).map(|(_, contig)| contig)
    }

    /// Iterates over the contigs in file order.
    pub fn iter(&self) -> impl Iterator<Item = &Contig> {
        self.contigs.values()
    }

    /// Iterates mutably over the contigs in file order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Contig> {
        self.contigs.values_mut()
    }
}
