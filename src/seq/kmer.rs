//! KmerKey : the canonical, 2 bits packed, kmer used as index key.
//!
//! Keys are also seen as base-4 integers (ordinals) in [0, 4^k), which is how the partitioner
//! cuts the key space. Ordinal order and key order coincide.

use std::cmp::Ordering;
use std::fmt;

use crate::error::{KmerSimError, Result};

use super::codec;

/// largest kmer size, so that an ordinal fits in a u64
pub const MAX_KMER_SIZE: usize = 32;

/// checks kmer size is usable
pub fn check_kmer_size(kmer_size: usize) -> Result<()> {
    if kmer_size == 0 || kmer_size > MAX_KMER_SIZE {
        return Err(KmerSimError::Config(format!(
            "kmer size must be in 1..={}, got {}",
            MAX_KMER_SIZE, kmer_size
        )));
    }
    Ok(())
}

/// number of distinct kmers of size k, 4^k. Returned as u128 as 4^32 does not fit a u64
#[inline]
pub fn key_space_size(kmer_size: usize) -> u128 {
    1u128 << (2 * kmer_size)
}

/// largest ordinal for kmer size k (the all T kmer)
#[inline]
pub fn max_ordinal(kmer_size: usize) -> u64 {
    (key_space_size(kmer_size) - 1) as u64
}

/// A kmer packed 2 bits / base. The ordering is the lexicographic ordering of the bases.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct KmerKey {
    packed: Vec<u8>,
    nb_base: usize,
}

impl KmerKey {
    /// packs seq as is. The caller is responsible for canonicalization.
    pub fn from_sequence(seq: &[u8]) -> Result<Self> {
        let packed = codec::pack(seq)?;
        Ok(KmerKey { packed, nb_base: seq.len() })
    }

    /// packs the canonical orientation of seq
    pub fn canonical_from_sequence(seq: &[u8]) -> Result<Self> {
        let canonical = codec::canonicalize(seq);
        KmerKey::from_sequence(&canonical)
    }

    /// wraps an already packed buffer, used when decoding index entries
    pub fn from_packed(packed: Vec<u8>, nb_base: usize) -> Result<Self> {
        if packed.len() != codec::packed_size(nb_base) {
            return Err(KmerSimError::CorruptIndex(format!(
                "key of {} bases cannot be stored in {} bytes",
                nb_base,
                packed.len()
            )));
        }
        Ok(KmerKey { packed, nb_base })
    }

    /// key of kmer_size bases whose base-4 value is ordinal
    pub fn from_ordinal(ordinal: u64, kmer_size: usize) -> Self {
        let mut packed = vec![0u8; codec::packed_size(kmer_size)];
        for i in 0..kmer_size {
            let bits = ((ordinal >> (2 * (kmer_size - 1 - i))) & 0b11) as u8;
            packed[i / 4] |= bits << (6 - 2 * (i % 4));
        }
        KmerKey { packed, nb_base: kmer_size }
    }

    /// the all A kmer
    pub fn min_key(kmer_size: usize) -> Self {
        KmerKey::from_ordinal(0, kmer_size)
    }

    /// the all T kmer
    pub fn max_key(kmer_size: usize) -> Self {
        KmerKey::from_ordinal(max_ordinal(kmer_size), kmer_size)
    }

    pub fn to_ordinal(&self) -> u64 {
        let mut ordinal = 0u64;
        for i in 0..self.nb_base {
            let bits = (self.packed[i / 4] >> (6 - 2 * (i % 4))) & 0b11;
            ordinal = (ordinal << 2) | bits as u64;
        }
        ordinal
    }

    pub fn to_sequence(&self) -> Vec<u8> {
        codec::unpack(&self.packed, self.nb_base)
    }

    pub fn get_packed(&self) -> &[u8] {
        &self.packed
    }

    pub fn get_nb_base(&self) -> usize {
        self.nb_base
    }
} // end of impl KmerKey

impl Ord for KmerKey {
    fn cmp(&self, other: &Self) -> Ordering {
        codec::compare_compressed(&self.packed, &other.packed).then(self.nb_base.cmp(&other.nb_base))
    }
}

impl PartialOrd for KmerKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for KmerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.to_sequence()))
    }
}

impl fmt::Debug for KmerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KmerKey({})", self)
    }
}

//==================================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordinal_round_trip() {
        for k in [1usize, 3, 4, 5, 11, 32] {
            for ord in [0u64, 1, 2, 3, max_ordinal(k) / 3, max_ordinal(k)] {
                let key = KmerKey::from_ordinal(ord, k);
                assert_eq!(key.to_ordinal(), ord, "k {} ord {}", k, ord);
                assert_eq!(key.get_nb_base(), k);
            }
        }
        assert_eq!(max_ordinal(32), u64::MAX);
    }

    #[test]
    fn ordinal_matches_sequence() {
        let key = KmerKey::from_sequence(b"ACGT").unwrap();
        assert_eq!(key.to_ordinal(), 0b00_01_10_11);
        assert_eq!(KmerKey::from_ordinal(0b00_01_10_11, 4), key);
        assert_eq!(KmerKey::max_key(5).to_string(), "TTTTT");
        assert_eq!(KmerKey::min_key(5).to_string(), "AAAAA");
    }

    #[test]
    fn key_order_is_ordinal_order() {
        let k = 7;
        let ords = [0u64, 5, 17, 255, 1000, 16383];
        for a in ords {
            for b in ords {
                let ka = KmerKey::from_ordinal(a, k);
                let kb = KmerKey::from_ordinal(b, k);
                assert_eq!(ka.cmp(&kb), a.cmp(&b));
            }
        }
    }

    #[test]
    fn canonical_key() {
        let key = KmerKey::canonical_from_sequence(b"TTTG").unwrap();
        assert_eq!(key.to_string(), "CAAA");
    }

    #[test]
    fn bad_kmer_size() {
        assert!(check_kmer_size(0).is_err());
        assert!(check_kmer_size(33).is_err());
        assert!(check_kmer_size(21).is_ok());
    }
} // end of mod tests
