//! Utilities related to opening and manipulating FASTA files.

use std::io::BufRead;
use std::path::Path;

use anyhow::bail;
use anyhow::Context;
use noodles::fasta;

use super::open_maybe_gzipped;
use super::BioinformaticsFileFormat;

/// Attempts to open a FASTA file from a given source. Gzipped files are
/// detected from their contents, so any extension is accepted as long as it
/// does not clearly name another format.
pub fn open<P>(src: P) -> anyhow::Result<fasta::Reader<Box<dyn BufRead>>>
where
    P: AsRef<Path>,
{
    let path = src.as_ref();

    match BioinformaticsFileFormat::try_detect(path) {
        Some(BioinformaticsFileFormat::FASTA) | Some(BioinformaticsFileFormat::FASTA_GZ) | None => {
            let reader = open_maybe_gzipped(path)
                .with_context(|| format!("opening FASTA file: {}", path.display()))?;
            Ok(fasta::Reader::new(reader))
        }
        Some(format) => bail!("incompatible formats: required FASTA, found {}", format),
    }
}
