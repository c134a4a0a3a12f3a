//! Utilities for working with nucleotide sequences.

use rand::Rng;

/// The four canonical nucleotides, in byte form.
pub const BASES: [u8; 4] = [b'A', b'C', b'G', b'T'];

/// Utility method to complement a single nucleotide. `N` complements to
/// itself; anything else is rejected.
///
/// # Examples
///
/// ```
/// use lrsim::utils::sequence;
/// assert_eq!(sequence::complement(b'a'), Some(b't'));
/// assert_eq!(sequence::complement(b'N'), Some(b'N'));
/// assert_eq!(sequence::complement(b'*'), None);
/// ```
pub fn complement(base: u8) -> Option<u8> {
    match base {
        b'a' => Some(b't'),
        b'c' => Some(b'g'),
        b'g' => Some(b'c'),
        b't' => Some(b'a'),
        b'n' => Some(b'n'),
        b'A' => Some(b'T'),
        b'C' => Some(b'G'),
        b'G' => Some(b'C'),
        b'T' => Some(b'A'),
        b'N' => Some(b'N'),
        _ => None,
    }
}

/// Reverse complements a byte string, failing if any of the characters in the
/// string fail to be complemented. This is wrapped in an Option accordingly.
///
/// # Arguments
///
/// * `seq`: the sequence of bytes to reverse complement.
pub fn reverse_complement(seq: &[u8]) -> Option<Vec<u8>> {
    seq.iter().rev().map(|base| complement(*base)).collect()
}

/// Draws a single uniformly random base.
pub fn random_base<R: Rng + ?Sized>(rng: &mut R) -> u8 {
    BASES[rng.gen_range(0..BASES.len())]
}

/// Draws a uniformly random base that differs from `base`.
pub fn random_different_base<R: Rng + ?Sized>(base: u8, rng: &mut R) -> u8 {
    loop {
        let candidate = random_base(rng);
        if candidate != base {
            return candidate;
        }
    }
}

/// Generates `length` uniformly random bases.
pub fn random_sequence<R: Rng + ?Sized>(length: usize, rng: &mut R) -> Vec<u8> {
    (0..length).map(|_| random_base(rng)).collect()
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    #[test]
    fn test_reverse_complement_valid() {
        let input = "ACTGactgN".as_bytes();
        assert_eq!(reverse_complement(input), Some(Vec::from("NcagtCAGT")));
    }

    #[test]
    fn test_reverse_complement_invalid() {
        let input: Vec<u8> = "AC-T".as_bytes().to_vec();
        assert_eq!(reverse_complement(&input), None);
    }

    #[test]
    fn test_random_sequence() {
        let mut rng = StdRng::seed_from_u64(0);
        let seq = random_sequence(1000, &mut rng);
        assert_eq!(seq.len(), 1000);
        for base in BASES {
            assert!(seq.contains(&base));
        }
        assert!(random_sequence(0, &mut rng).is_empty());
    }

    #[test]
    fn test_random_different_base() {
        let mut rng = StdRng::seed_from_u64(0);
        for _ in 0..100 {
            assert_ne!(random_different_base(b'A', &mut rng), b'A');
        }
    }
}
