//! Exact edit-distance alignment between a read and the fragment it came from.
//!
//! Alignments are computed with the pairwise aligners from `bio`, scored as a
//! plain edit distance (matches are free; mismatches and each gapped base cost
//! one). Small problems use the full dynamic programming matrix. Long
//! sequences use the banded aligner, which only fills cells near shared k-mer
//! seeds and keeps memory linear in the sequence length. When the band gets
//! too large the banded aligner gives up, and the fragment is instead aligned
//! piece by piece against a read window that follows the previous piece.

use bio::alignment::pairwise::banded;
use bio::alignment::pairwise::Aligner;
use bio::alignment::pairwise::Scoring;
use bio::alignment::AlignmentOperation;
use tracing::debug;

use crate::utils::cigar::CigarOp;

/// Above this many matrix cells, the banded aligner is used.
const FULL_MATRIX_CELL_LIMIT: usize = 4_000_000;

/// Seed length for the banded aligner.
const BAND_KMER: usize = 8;

/// Band width around seed chains for the banded aligner.
const BAND_WIDTH: usize = 100;

/// Length of the pieces aligned separately when the banded aligner gives up.
const CHUNK_SIZE: usize = 1000;

/// Edit distance scoring: a match costs nothing, everything else costs one.
fn edit_score(a: u8, b: u8) -> i32 {
    if a == b {
        0
    } else {
        -1
    }
}

/// Aligns `read` against `fragment` globally and returns one [`CigarOp`] per
/// alignment column. The columns always consume every base of both
/// sequences.
pub fn align(read: &[u8], fragment: &[u8]) -> Vec<CigarOp> {
    if read.is_empty() || fragment.is_empty() {
        return full_alignment(read, fragment);
    }

    if read.len().saturating_mul(fragment.len()) <= FULL_MATRIX_CELL_LIMIT {
        return full_alignment(read, fragment);
    }

    // The banded aligner returns an empty alignment when its band grows too
    // large, so its result is only used when it spans both sequences.
    let mut aligner = banded::Aligner::new(0, -1, edit_score, BAND_KMER, BAND_WIDTH);
    let columns = columns_from_operations(&aligner.global(read, fragment).operations);
    if consumed_lengths(&columns) == (read.len(), fragment.len()) {
        return columns;
    }

    debug!(
        "Banded alignment of {} bp against {} bp was incomplete; aligning in chunks.",
        read.len(),
        fragment.len()
    );
    chunked_alignment(read, fragment)
}

/// Aligns with the full dynamic programming matrix.
fn full_alignment(read: &[u8], fragment: &[u8]) -> Vec<CigarOp> {
    if read.is_empty() {
        return vec![CigarOp::Deletion; fragment.len()];
    }

    if fragment.is_empty() {
        return vec![CigarOp::Insertion; read.len()];
    }

    let mut aligner = Aligner::with_capacity(read.len(), fragment.len(), 0, -1, edit_score);
    columns_from_operations(&aligner.global(read, fragment).operations)
}

/// Walks along the fragment in pieces of [`CHUNK_SIZE`] bases. Each piece is
/// aligned against a window of the read that starts where the previous piece
/// ended and whose end is left free, so the read position follows the
/// alignment rather than drifting. The last piece (and anything left after a
/// piece that did not span its fragment bases) is split proportionally.
fn chunked_alignment(read: &[u8], fragment: &[u8]) -> Vec<CigarOp> {
    let scoring = Scoring::new(0, -1, edit_score).xclip_suffix(0);
    let mut aligner = Aligner::with_capacity_and_scoring(2 * CHUNK_SIZE, CHUNK_SIZE, scoring);

    let mut columns = Vec::with_capacity(read.len().max(fragment.len()));
    let (mut read_start, mut fragment_start) = (0, 0);

    while fragment.len() - fragment_start > CHUNK_SIZE && read_start < read.len() {
        let fragment_end = fragment_start + CHUNK_SIZE;
        let read_end = (read_start + 2 * CHUNK_SIZE).min(read.len());

        let mut operations = aligner
            .custom(&read[read_start..read_end], &fragment[fragment_start..fragment_end])
            .operations;
        if let Some(AlignmentOperation::Xclip(_)) = operations.last() {
            operations.pop();
        }

        let piece = columns_from_operations(&operations);
        let (read_consumed, fragment_consumed) = consumed_lengths(&piece);
        if fragment_consumed != CHUNK_SIZE {
            break;
        }

        columns.extend(piece);
        read_start += read_consumed;
        fragment_start = fragment_end;
    }

    columns.extend(proportional_alignment(
        &read[read_start..],
        &fragment[fragment_start..],
    ));
    columns
}

/// Splits both sequences into the same number of proportional pieces and
/// aligns each pair with the full matrix.
fn proportional_alignment(read: &[u8], fragment: &[u8]) -> Vec<CigarOp> {
    let chunks = (read.len().max(fragment.len()) + CHUNK_SIZE - 1) / CHUNK_SIZE;
    let bounds =
        |length: usize, chunk: usize| (length * chunk / chunks, length * (chunk + 1) / chunks);

    let mut columns = Vec::with_capacity(read.len().max(fragment.len()));
    for chunk in 0..chunks {
        let (read_start, read_end) = bounds(read.len(), chunk);
        let (fragment_start, fragment_end) = bounds(fragment.len(), chunk);
        columns.extend(full_alignment(
            &read[read_start..read_end],
            &fragment[fragment_start..fragment_end],
        ));
    }

    columns
}

/// The number of read and fragment bases consumed by the columns.
pub fn consumed_lengths(columns: &[CigarOp]) -> (usize, usize) {
    let read = columns.iter().filter(|op| op.consumes_read()).count();
    let fragment = columns
        .iter()
        .filter(|op| **op != CigarOp::Insertion)
        .count();
    (read, fragment)
}

/// Converts `bio`'s operations (with `read` as `x`) into per-column operations.
fn columns_from_operations(operations: &[AlignmentOperation]) -> Vec<CigarOp> {
    let mut columns = Vec::with_capacity(operations.len());

    for operation in operations {
        match operation {
            AlignmentOperation::Match => columns.push(CigarOp::Match),
            AlignmentOperation::Subst => columns.push(CigarOp::Mismatch),
            AlignmentOperation::Ins => columns.push(CigarOp::Insertion),
            AlignmentOperation::Del => columns.push(CigarOp::Deletion),
            // Global alignments never clip, but a clip still accounts for
            // every base it skips.
            AlignmentOperation::Xclip(n) => {
                columns.extend(std::iter::repeat(CigarOp::Insertion).take(*n))
            }
            AlignmentOperation::Yclip(n) => {
                columns.extend(std::iter::repeat(CigarOp::Deletion).take(*n))
            }
        }
    }

    columns
}

/// Aligns the two sequences and reports their identity (matching columns over
/// all columns).
pub fn identity(read: &[u8], fragment: &[u8]) -> f64 {
    crate::utils::cigar::identity(&align(read, fragment))
}
