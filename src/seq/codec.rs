//! 2 bits / base packing of nucleotide strings.
//!
//! A,C,G,T are coded 0..3 and packed 4 bases per byte, first base in the high bits.
//! The last byte is zero padded when the length is not a multiple of 4.
//! With this code the order of packed buffers is the lexicographic order of the strings.

use std::borrow::Cow;
use std::cmp::Ordering;

use crate::error::{KmerSimError, Result};

const BITS_TO_BASE: [u8; 4] = [b'A', b'C', b'G', b'T'];

/// 2 bits code of a base, None if base is not in ACGT (upper case only)
#[inline]
pub fn base_to_bits(base: u8) -> Option<u8> {
    match base {
        b'A' => Some(0),
        b'C' => Some(1),
        b'G' => Some(2),
        b'T' => Some(3),
        _ => None,
    }
}

#[inline]
pub fn bits_to_base(bits: u8) -> u8 {
    BITS_TO_BASE[(bits & 0b11) as usize]
}

#[inline]
pub fn is_valid_base(base: u8) -> bool {
    base_to_bits(base).is_some()
}

/// true if all symbols are in {A,C,G,T}. Must be checked before [pack].
pub fn is_valid_sequence(seq: &[u8]) -> bool {
    seq.iter().all(|b| is_valid_base(*b))
}

/// complement of a base. Symbols out of ACGT are returned unchanged.
#[inline]
pub fn complement(base: u8) -> u8 {
    match base {
        b'A' => b'T',
        b'C' => b'G',
        b'G' => b'C',
        b'T' => b'A',
        other => other,
    }
}

pub fn reverse_complement(seq: &[u8]) -> Vec<u8> {
    seq.iter().rev().map(|b| complement(*b)).collect()
}

/// number of bytes needed to pack a sequence of length seq_len
#[inline]
pub fn packed_size(seq_len: usize) -> usize {
    (seq_len + 3) / 4
}

/// packs seq into out (cleared first), so a caller can reuse its buffer.
pub fn pack_into(seq: &[u8], out: &mut Vec<u8>) -> Result<()> {
    out.clear();
    out.resize(packed_size(seq.len()), 0);
    for (i, base) in seq.iter().enumerate() {
        let bits = base_to_bits(*base).ok_or(KmerSimError::InvalidSymbol {
            symbol: *base as char,
            position: i,
        })?;
        out[i / 4] |= bits << (6 - 2 * (i % 4));
    }
    Ok(())
} // end of pack_into

pub fn pack(seq: &[u8]) -> Result<Vec<u8>> {
    let mut packed = Vec::with_capacity(packed_size(seq.len()));
    pack_into(seq, &mut packed)?;
    Ok(packed)
}

/// decodes seq_len bases from packed into out (cleared first)
pub fn unpack_into(packed: &[u8], seq_len: usize, out: &mut Vec<u8>) {
    out.clear();
    out.reserve(seq_len);
    for i in 0..seq_len.min(4 * packed.len()) {
        let bits = packed[i / 4] >> (6 - 2 * (i % 4));
        out.push(bits_to_base(bits));
    }
}

pub fn unpack(packed: &[u8], seq_len: usize) -> Vec<u8> {
    let mut seq = Vec::with_capacity(seq_len);
    unpack_into(packed, seq_len, &mut seq);
    seq
}

/// returns the lexicographically smaller of seq and its reverse complement.
///
/// Both orientations are scanned together from the ends inwards, the first position where
/// they differ decides. A palindrome is returned as is.
pub fn canonicalize(seq: &[u8]) -> Cow<'_, [u8]> {
    let len = seq.len();
    for i in 0..len {
        let forward = seq[i];
        let rc = complement(seq[len - 1 - i]);
        match rc.cmp(&forward) {
            Ordering::Less => return Cow::Owned(reverse_complement(seq)),
            Ordering::Greater => return Cow::Borrowed(seq),
            Ordering::Equal => continue,
        }
    }
    Cow::Borrowed(seq)
} // end of canonicalize

/// compares two packed buffers base by base without unpacking.
///
/// Gives the same order as comparing the unpacked strings only when both buffers hold the same
/// number of bases. Padding bits are compared as bases, so two lengths packing into the same number
/// of bytes can compare Equal (AC and ACA). Buffers of different byte length with equal common part are
/// ordered by byte length. Callers mixing lengths must break ties on the base count, as [crate::seq::KmerKey] does.
pub fn compare_compressed(a: &[u8], b: &[u8]) -> Ordering {
    for (byte_a, byte_b) in a.iter().zip(b.iter()) {
        if byte_a == byte_b {
            continue;
        }
        for shift in [6u8, 4, 2, 0] {
            let group_a = (byte_a >> shift) & 0b11;
            let group_b = (byte_b >> shift) & 0b11;
            if group_a != group_b {
                return group_a.cmp(&group_b);
            }
        }
    }
    a.len().cmp(&b.len())
} // end of compare_compressed

//=====================================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn all_kmers(k: usize) -> Vec<Vec<u8>> {
        let mut res = vec![Vec::new()];
        for _ in 0..k {
            let mut next = Vec::with_capacity(res.len() * 4);
            for s in &res {
                for b in BITS_TO_BASE {
                    let mut v = s.clone();
                    v.push(b);
                    next.push(v);
                }
            }
            res = next;
        }
        res
    }

    #[test]
    fn pack_unpack_is_bijective() {
        for k in 1..=6 {
            for s in all_kmers(k) {
                let packed = pack(&s).unwrap();
                assert_eq!(packed.len(), packed_size(k));
                assert_eq!(unpack(&packed, k), s);
            }
        }
    }

    #[test]
    fn pack_layout_is_left_aligned() {
        assert_eq!(pack(b"ACGT").unwrap(), vec![0b00_01_10_11]);
        // 5 bases : second byte holds T in its high bits, rest is zero padding
        assert_eq!(pack(b"ACGTT").unwrap(), vec![0b00_01_10_11, 0b11_00_00_00]);
    }

    #[test]
    fn pack_rejects_invalid_symbol() {
        match pack(b"ACNT") {
            Err(KmerSimError::InvalidSymbol { symbol, position }) => {
                assert_eq!(symbol, 'N');
                assert_eq!(position, 2);
            }
            _ => panic!("expected InvalidSymbol"),
        }
        assert!(pack(b"acgt").is_err());
        assert!(!is_valid_sequence(b"ACGN"));
        assert!(is_valid_sequence(b"ACGTTGCA"));
    }

    #[test]
    fn canonical_is_idempotent_and_strand_independent() {
        for k in 1..=5 {
            for s in all_kmers(k) {
                let canon = canonicalize(&s).into_owned();
                assert_eq!(canonicalize(&canon).as_ref(), canon.as_slice());
                let rc = reverse_complement(&s);
                assert_eq!(canonicalize(&rc).as_ref(), canon.as_slice());
                // smaller of both
                assert_eq!(canon, s.clone().min(rc));
            }
        }
    }

    #[test]
    fn canonical_keeps_palindrome() {
        // ACGT is its own reverse complement
        assert_eq!(canonicalize(b"ACGT").as_ref(), b"ACGT");
        assert_eq!(canonicalize(b"TTTT").as_ref(), b"AAAA");
        assert_eq!(canonicalize(b"GGG").as_ref(), b"CCC");
    }

    #[test]
    fn compare_compressed_matches_string_order() {
        let kmers = all_kmers(5);
        for a in kmers.iter().step_by(7) {
            for b in kmers.iter().step_by(3) {
                let pa = pack(a).unwrap();
                let pb = pack(b).unwrap();
                assert_eq!(compare_compressed(&pa, &pb), a.cmp(b), "{:?} {:?}", a, b);
            }
        }
    }

    #[test]
    fn mixed_lengths_need_base_count() {
        let short = pack(b"AC").unwrap();
        let long = pack(b"ACA").unwrap();
        assert_eq!(compare_compressed(&short, &long), Ordering::Equal);
        let short_key = crate::seq::KmerKey::from_sequence(b"AC").unwrap();
        let long_key = crate::seq::KmerKey::from_sequence(b"ACA").unwrap();
        assert_eq!(short_key.cmp(&long_key), Ordering::Less);
        // different byte lengths
        assert_eq!(compare_compressed(&pack(b"ACGT").unwrap(), &pack(b"ACGTA").unwrap()), Ordering::Less);
    }
} // end of mod tests
