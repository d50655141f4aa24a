//! Iteration over the canonical kmers of a read.

use super::codec::base_to_bits;
use super::kmer::KmerKey;

/// Iterates over valid windows of size k of a read and yields the ordinal of the canonical kmer.
///
/// Forward and reverse complement values are rolled as each base enters the window,
/// so each base is examined once. A window containing a non ACGT symbol is skipped,
/// lower case bases are accepted.
pub struct KmerWindows<'a> {
    seq: &'a [u8],
    kmer_size: usize,
    mask: u64,
    // position of next base to enter
    pos: usize,
    // number of valid bases at the end of current window
    nb_valid: usize,
    forward: u64,
    reverse: u64,
}

impl<'a> KmerWindows<'a> {
    /// kmer_size must be in 1..=32, see [check_kmer_size](super::kmer::check_kmer_size)
    pub fn new(seq: &'a [u8], kmer_size: usize) -> Self {
        let mask = if kmer_size >= 32 { u64::MAX } else { (1u64 << (2 * kmer_size)) - 1 };
        KmerWindows { seq, kmer_size, mask, pos: 0, nb_valid: 0, forward: 0, reverse: 0 }
    }

    pub fn get_kmer_size(&self) -> usize {
        self.kmer_size
    }

    /// same iteration but yields packed keys
    pub fn keys(self) -> impl Iterator<Item = KmerKey> + 'a {
        let kmer_size = self.kmer_size;
        self.map(move |ordinal| KmerKey::from_ordinal(ordinal, kmer_size))
    }
} // end of impl KmerWindows

impl<'a> Iterator for KmerWindows<'a> {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        let rc_shift = 2 * (self.kmer_size - 1);
        while self.pos < self.seq.len() {
            let base = self.seq[self.pos].to_ascii_uppercase();
            self.pos += 1;
            match base_to_bits(base) {
                Some(bits) => {
                    self.forward = ((self.forward << 2) | bits as u64) & self.mask;
                    self.reverse = (self.reverse >> 2) | (((3 - bits) as u64) << rc_shift);
                    self.nb_valid += 1;
                    if self.nb_valid >= self.kmer_size {
                        return Some(self.forward.min(self.reverse));
                    }
                }
                None => {
                    // restart the window after the bad symbol
                    self.nb_valid = 0;
                    self.forward = 0;
                    self.reverse = 0;
                }
            }
        }
        None
    } // end of next
} // end of impl Iterator for KmerWindows

//====================================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seq::codec::{canonicalize, is_valid_sequence};

    fn naive(seq: &[u8], k: usize) -> Vec<KmerKey> {
        let upper = seq.to_ascii_uppercase();
        upper
            .windows(k)
            .filter(|w| is_valid_sequence(w))
            .map(|w| KmerKey::from_sequence(&canonicalize(w)).unwrap())
            .collect()
    }

    #[test]
    fn windows_match_canonicalize() {
        let seq = b"ACGTTGCAAGGCTTANNACGTacgtgGCCATTGACNA";
        for k in [1usize, 3, 4, 5, 8] {
            let got: Vec<KmerKey> = KmerWindows::new(seq, k).keys().collect();
            assert_eq!(got, naive(seq, k), "k = {}", k);
        }
    }

    #[test]
    fn windows_skip_invalid() {
        let got: Vec<u64> = KmerWindows::new(b"AANAAA", 3).collect();
        assert_eq!(got, vec![0]);
        assert_eq!(KmerWindows::new(b"AC", 3).count(), 0);
        assert_eq!(KmerWindows::new(b"", 3).count(), 0);
    }

    #[test]
    fn windows_at_max_kmer_size() {
        let seq: Vec<u8> = b"ACGTTGCAAGGCTTAGACGTACGTGGCCATTGACCA".to_vec();
        let got: Vec<KmerKey> = KmerWindows::new(&seq, 32).keys().collect();
        assert_eq!(got, naive(&seq, 32));
    }
} // end of mod tests
