//! Statistics gathered over a simulation run.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use anyhow::Context;
use serde::Serialize;
use tracing::info;

use crate::simulate::read::SimulatedRead;
use crate::utils::display::formatted_count;
use crate::utils::display::PercentageFormat;

/// Summary of the reads produced by a run.
#[derive(Clone, Debug, Default, Serialize)]
pub struct SimulationSummary {
    /// The number of bases the run aimed for.
    pub target_bases: u64,

    /// Number of reads written.
    pub reads: u64,

    /// Number of bases written.
    pub bases: u64,

    /// N50 of the written read lengths.
    pub n50: u64,

    /// Mean read identity, weighted by read length.
    pub mean_identity: f64,

    /// Number of reads made from more than one fragment.
    pub chimeric_reads: u64,

    /// Number of reads containing junk sequence.
    pub junk_reads: u64,

    /// Number of reads containing random sequence.
    pub random_reads: u64,

    /// Number of reads dropped because every base was lost.
    pub empty_reads_skipped: u64,

    #[serde(skip)]
    read_lengths: Vec<u64>,

    #[serde(skip)]
    weighted_identity: f64,
}

impl SimulationSummary {
    /// Creates an empty summary for a run aiming at `target_bases`.
    pub fn new(target_bases: u64) -> Self {
        SimulationSummary {
            target_bases,
            ..Default::default()
        }
    }

    /// Adds a written read.
    pub fn record(&mut self, read: &SimulatedRead) {
        let length = read.sequence.len() as u64;

        self.reads += 1;
        self.bases += length;
        self.weighted_identity += read.identity * length as f64;
        self.read_lengths.push(length);

        if read.is_chimeric() {
            self.chimeric_reads += 1;
        }
        if read.has_junk() {
            self.junk_reads += 1;
        }
        if read.has_random() {
            self.random_reads += 1;
        }
    }

    /// Counts a read that was dropped for being empty.
    pub fn record_empty(&mut self) {
        self.empty_reads_skipped += 1;
    }

    /// Computes the N50 and mean identity from the recorded reads.
    pub fn finish(&mut self) {
        self.mean_identity = match self.bases {
            0 => 0.0,
            bases => self.weighted_identity / bases as f64,
        };
        self.n50 = n50(&mut self.read_lengths);
    }

    /// Logs the summary.
    pub fn log(&self) {
        info!("Summary:");
        info!("  [*] Reads: {}", formatted_count(self.reads));
        info!(
            "  [*] Bases: {} (target {})",
            formatted_count(self.bases),
            formatted_count(self.target_bases)
        );
        info!("  [*] Read N50: {}", formatted_count(self.n50));
        info!(
            "  [*] Mean identity: {:.2}%",
            self.mean_identity * 100.0
        );
        info!(
            "  [*] Chimeric reads: {}",
            PercentageFormat(self.chimeric_reads, self.reads)
        );
        info!(
            "  [*] Junk reads: {}",
            PercentageFormat(self.junk_reads, self.reads)
        );
        info!(
            "  [*] Random reads: {}",
            PercentageFormat(self.random_reads, self.reads)
        );
    }

    /// Writes the summary as pretty-printed JSON.
    pub fn write<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let path = path.as_ref();
        let output = serde_json::to_string_pretty(&self)?;
        let mut file = File::create(path)
            .with_context(|| format!("creating summary file: {}", path.display()))?;
        file.write_all(output.as_bytes())?;
        Ok(())
    }
}

/// The length at which half of all bases are in reads at least that long.
fn n50(lengths: &mut [u64]) -> u64 {
    lengths.sort_unstable_by(|a, b| b.cmp(a));
    let target = lengths.iter().sum::<u64>() as f64 / 2.0;

    let mut total = 0;
    for length in lengths.iter() {
        total += length;
        if total as f64 >= target {
            return *length;
        }
    }

    0
}
