//! Utilities related to opening and manipulating FASTQ files.

use std::fs::File;
use std::io;
use std::io::BufWriter;
use std::io::Stdout;
use std::io::Write;
use std::path::Path;

use anyhow::bail;
use flate2::write::GzEncoder;
use flate2::Compression;

use super::BioinformaticsFileFormat;

/// A FASTQ output destination.
pub enum FastqOutput {
    /// Standard output.
    Stdout(BufWriter<Stdout>),

    /// An uncompressed file.
    Plain(BufWriter<File>),

    /// A gzipped file.
    Gzip(BufWriter<GzEncoder<File>>),
}

impl FastqOutput {
    /// Flushes all buffered data and, for gzipped output, writes the gzip
    /// trailer. Nothing should be written afterwards.
    pub fn finish(&mut self) -> io::Result<()> {
        match self {
            FastqOutput::Stdout(writer) => writer.flush(),
            FastqOutput::Plain(writer) => writer.flush(),
            FastqOutput::Gzip(writer) => {
                writer.flush()?;
                writer.get_mut().try_finish()
            }
        }
    }
}

impl Write for FastqOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            FastqOutput::Stdout(writer) => writer.write(buf),
            FastqOutput::Plain(writer) => writer.write(buf),
            FastqOutput::Gzip(writer) => writer.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            FastqOutput::Stdout(writer) => writer.flush(),
            FastqOutput::Plain(writer) => writer.flush(),
            FastqOutput::Gzip(writer) => writer.flush(),
        }
    }
}

/// Attempts to open a FASTQ file for writing. The path `-` writes to stdout.
pub fn writer<P>(src: P) -> anyhow::Result<FastqOutput>
where
    P: AsRef<Path>,
{
    let path = src.as_ref();

    if path == Path::new("-") {
        return Ok(FastqOutput::Stdout(BufWriter::new(io::stdout())));
    }

    match BioinformaticsFileFormat::try_detect(path) {
        Some(BioinformaticsFileFormat::FASTQ_GZ) => {
            let writer = File::create(path)
                .map(|f| GzEncoder::new(f, Compression::default()))
                .map(BufWriter::new)?;
            Ok(FastqOutput::Gzip(writer))
        }
        Some(BioinformaticsFileFormat::FASTQ) => {
            let writer = File::create(path).map(BufWriter::new)?;
            Ok(FastqOutput::Plain(writer))
        }
        Some(format) => bail!("incompatible formats: required FASTQ, found {}", format),
        None => bail!(
            "Not able to determine filetype for output: {}",
            path.display()
        ),
    }
}
