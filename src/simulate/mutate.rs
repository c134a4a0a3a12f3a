//! Adding errors to a fragment until it reaches a target identity.
//!
//! The fragment is padded with `k` random bases on each side (so the error
//! model can reach its first and last bases) and every padded position gets a
//! [`Slot`]. Each iteration picks a random k-mer of the *original* fragment,
//! asks the error model for a mutated version, and commits every changed slot
//! that has not been changed before.
//!
//! Counting committed changes overestimates the true edit distance (a nearby
//! insertion and deletion may cancel out), so added errors are scaled by
//! `identity^1.5` and the count is regularly replaced by a real alignment:
//! of the whole fragment when it is short, or of a random window blended into
//! the running estimate when it is long.

use rand::Rng;

use crate::models::error_model::representation_bytes;
use crate::models::error_model::representation_of;
use crate::models::error_model::ErrorModel;
use crate::models::error_model::Slot;
use crate::models::qscore_model::assign_qualities;
use crate::models::qscore_model::QScoreModel;
use crate::simulate::settings;
use crate::utils::alignment;
use crate::utils::sequence::random_sequence;

/// A fragment after sequencing.
#[derive(Clone, Debug, PartialEq)]
pub struct SequencedFragment {
    /// The read bases.
    pub sequence: Vec<u8>,

    /// The FASTQ quality characters.
    pub qualities: Vec<u8>,

    /// The actual identity of the read to its fragment.
    pub identity: f64,

    /// The identity implied by the qualities.
    pub qscore_identity: f64,
}

/// Adds errors to a fragment, then assigns qualities to the result.
pub fn sequence_fragment<R: Rng + ?Sized>(
    fragment: &[u8],
    target_identity: f64,
    error_model: &ErrorModel,
    qscore_model: &QScoreModel,
    rng: &mut R,
) -> SequencedFragment {
    let sequence = add_errors(fragment, target_identity, error_model, rng);
    let assignment = assign_qualities(&sequence, fragment, qscore_model, rng);

    SequencedFragment {
        sequence,
        qualities: assignment.qualities,
        identity: assignment.identity,
        qscore_identity: assignment.qscore_identity,
    }
}

/// Mutates `fragment` until its estimated identity falls to
/// `target_identity`. Gives up (returning whatever was reached) after too
/// many changes or iterations.
pub fn add_errors<R: Rng + ?Sized>(
    fragment: &[u8],
    target_identity: f64,
    error_model: &ErrorModel,
    rng: &mut R,
) -> Vec<u8> {
    if fragment.is_empty() || target_identity >= 1.0 || error_model.is_perfect() {
        return fragment.to_vec();
    }

    let k = error_model.kmer_size();
    let padded = [
        random_sequence(k, rng),
        fragment.to_vec(),
        random_sequence(k, rng),
    ]
    .concat();
    let length = padded.len();

    let mut slots = representation_of(&padded);
    let mut touched = vec![false; length];
    let mut errors = 0.0;
    let mut changes = 0;
    let mut iterations = 0;

    let max_changes = (settings::MAX_CHANGE_FRACTION * length as f64) as usize;
    let max_iterations = settings::MAX_ITERATIONS_PER_BASE * length;

    loop {
        let estimated_identity = 1.0 - errors / length as f64;
        if estimated_identity <= target_identity
            || changes >= max_changes
            || iterations > max_iterations
        {
            break;
        }
        iterations += 1;

        let i = rng.gen_range(0..=length - k);
        let kmer = &padded[i..i + k];
        let alternative = error_model.mutate(kmer, rng);
        if alternative
            .iter()
            .zip(kmer)
            .all(|(slot, base)| slot.is_base(*base))
        {
            continue;
        }

        for (j, slot) in alternative.into_iter().enumerate() {
            let p = i + j;
            if touched[p] || slot.is_base(padded[p]) {
                continue;
            }

            let added = match &slot {
                Slot::Inserted(bases) => (bases.len() - 1) as f64,
                Slot::Deleted | Slot::Single(_) => 1.0,
            };
            errors += added * estimated_identity.powf(1.5);
            slots[p] = slot;
            touched[p] = true;
            changes += 1;

            if changes % settings::ALIGNMENT_INTERVAL == 0 {
                errors = realign_errors(&padded, &slots, errors, rng);
            }
        }
    }

    // Padding may have gained or lost bases, so strip it by its output size.
    let prefix: usize = slots[..k].iter().map(Slot::len).sum();
    let suffix: usize = slots[length - k..].iter().map(Slot::len).sum();
    let bytes = representation_bytes(&slots);
    bytes[prefix..bytes.len() - suffix].to_vec()
}

/// Replaces the running error count with one from an alignment.
fn realign_errors<R: Rng + ?Sized>(
    original: &[u8],
    slots: &[Slot],
    errors: f64,
    rng: &mut R,
) -> f64 {
    let length = original.len();

    if length <= settings::ALIGNMENT_SIZE {
        let mutated = representation_bytes(slots);
        return (1.0 - alignment::identity(&mutated, original)) * length as f64;
    }

    let start = rng.gen_range(0..=length - settings::ALIGNMENT_SIZE);
    let end = start + settings::ALIGNMENT_SIZE;
    let window_identity =
        alignment::identity(&representation_bytes(&slots[start..end]), &original[start..end]);

    let weight = settings::ALIGNMENT_SIZE as f64 / length as f64;
    let current_identity = 1.0 - errors / length as f64;
    let blended = weight * window_identity + (1.0 - weight) * current_identity;
    (1.0 - blended) * length as f64
}
