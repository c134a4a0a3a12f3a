//! Utilities related to CIGAR operations. Alignments in this crate are always
//! described column-by-column (one [`CigarOp`] per alignment column) from the
//! point of view of the read: an insertion is a read base with no counterpart
//! in the fragment and a deletion is a fragment base missing from the read.

use std::fmt;

use itertools::Itertools;

/// A single alignment column.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum CigarOp {
    /// Read and fragment bases are identical (`=`).
    Match,

    /// Read and fragment bases differ (`X`).
    Mismatch,

    /// A read base with no fragment counterpart (`I`).
    Insertion,

    /// A fragment base with no read counterpart (`D`).
    Deletion,
}

impl CigarOp {
    /// The extended CIGAR character for this operation.
    pub fn as_char(&self) -> char {
        match self {
            CigarOp::Match => '=',
            CigarOp::Mismatch => 'X',
            CigarOp::Insertion => 'I',
            CigarOp::Deletion => 'D',
        }
    }

    /// Parses an extended CIGAR character.
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            '=' => Some(CigarOp::Match),
            'X' => Some(CigarOp::Mismatch),
            'I' => Some(CigarOp::Insertion),
            'D' => Some(CigarOp::Deletion),
            _ => None,
        }
    }

    /// Reports whether the operation consumes a read base.
    pub fn consumes_read(&self) -> bool {
        !matches!(self, CigarOp::Deletion)
    }
}

impl fmt::Display for CigarOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// Parses a per-column CIGAR string (e.g. `=X=I=`). Run-length counts are not
/// accepted here.
pub fn parse_columns(s: &str) -> Option<Vec<CigarOp>> {
    s.chars().map(CigarOp::from_char).collect()
}

/// Renders columns as a per-column string (e.g. `==X=`).
pub fn to_column_string(ops: &[CigarOp]) -> String {
    ops.iter().map(CigarOp::as_char).collect()
}

/// Renders columns as a run-length compressed CIGAR string (e.g. `2=1X1=`).
pub fn to_run_length_string(ops: &[CigarOp]) -> String {
    ops.iter()
        .dedup_with_count()
        .map(|(count, op)| format!("{}{}", count, op))
        .collect()
}

/// Identity of an alignment: matching columns over all columns. An empty
/// alignment has an identity of zero.
pub fn identity(ops: &[CigarOp]) -> f64 {
    if ops.is_empty() {
        return 0.0;
    }

    let matches = ops.iter().filter(|op| **op == CigarOp::Match).count();
    matches as f64 / ops.len() as f64
}
