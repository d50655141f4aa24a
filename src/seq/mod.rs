//! Nucleotide sequence codec, canonical kmer keys and kmer windowing.

pub mod codec;
pub mod kmer;
pub mod window;

pub use codec::{canonicalize, compare_compressed, is_valid_sequence, pack, reverse_complement, unpack};
pub use kmer::{check_kmer_size, key_space_size, max_ordinal, KmerKey, MAX_KMER_SIZE};
pub use window::KmerWindows;
