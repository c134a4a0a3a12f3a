//! Utilities related to bioinformatics file formats.

use std::fmt;
use std::fs::File;
use std::io;
use std::io::BufRead;
use std::io::BufReader;
use std::path::Path;

use flate2::read::MultiGzDecoder;

pub mod fasta;
pub mod fastq;

/// The two magic bytes at the start of every gzip stream.
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// File formats this crate reads or writes, as detected from a path's
/// extension.
#[allow(non_camel_case_types, clippy::upper_case_acronyms)]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BioinformaticsFileFormat {
    /// An uncompressed FASTA file.
    FASTA,

    /// A gzipped FASTA file.
    FASTA_GZ,

    /// An uncompressed FASTQ file.
    FASTQ,

    /// A gzipped FASTQ file.
    FASTQ_GZ,
}

impl BioinformaticsFileFormat {
    /// Attempts to detect the file format from the extension(s) of `path`.
    pub fn try_detect<P>(path: P) -> Option<Self>
    where
        P: AsRef<Path>,
    {
        let name = path.as_ref().file_name()?.to_str()?.to_ascii_lowercase();
        let (stem, gzipped) = match name.strip_suffix(".gz") {
            Some(stem) => (stem.to_string(), true),
            None => (name, false),
        };

        let extension = stem.rsplit_once('.').map(|(_, ext)| ext)?;
        match (extension, gzipped) {
            ("fa" | "fasta" | "fna" | "fas", false) => Some(Self::FASTA),
            ("fa" | "fasta" | "fna" | "fas", true) => Some(Self::FASTA_GZ),
            ("fq" | "fastq", false) => Some(Self::FASTQ),
            ("fq" | "fastq", true) => Some(Self::FASTQ_GZ),
            _ => None,
        }
    }
}

impl fmt::Display for BioinformaticsFileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FASTA => write!(f, "FASTA"),
            Self::FASTA_GZ => write!(f, "gzipped FASTA"),
            Self::FASTQ => write!(f, "FASTQ"),
            Self::FASTQ_GZ => write!(f, "gzipped FASTQ"),
        }
    }
}

/// Opens a file for buffered reading, transparently decompressing it when it
/// starts with the gzip magic bytes (regardless of its extension).
pub fn open_maybe_gzipped<P>(src: P) -> io::Result<Box<dyn BufRead>>
where
    P: AsRef<Path>,
{
    let mut reader = BufReader::new(File::open(src)?);

    if reader.fill_buf()?.starts_with(&GZIP_MAGIC) {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(reader))))
    } else {
        Ok(Box::new(reader))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_try_detect() {
        use BioinformaticsFileFormat::*;

        assert_eq!(BioinformaticsFileFormat::try_detect("ref.fasta"), Some(FASTA));
        assert_eq!(BioinformaticsFileFormat::try_detect("ref.FA.gz"), Some(FASTA_GZ));
        assert_eq!(BioinformaticsFileFormat::try_detect("reads.fq"), Some(FASTQ));
        assert_eq!(
            BioinformaticsFileFormat::try_detect("/tmp/out/reads.fastq.gz"),
            Some(FASTQ_GZ)
        );
        assert_eq!(BioinformaticsFileFormat::try_detect("reads.bam"), None);
        assert_eq!(BioinformaticsFileFormat::try_detect("reads"), None);
    }
}
