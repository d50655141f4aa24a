//! Pairwise similarity of sequence samples from their kmer frequencies.
//!
//! Each sample is turned into a sorted, chunked on-disk index of canonical kmers and their counts.
//! The key space is cut into partitions. For each partition the indexes of all samples are merge joined,
//! and the joined rows are accumulated into a dense sample x sample score matrix
//! (cosine, Bray-Curtis or Jensen-Shannon).

pub mod error;
pub mod index;
pub mod join;
pub mod partition;
pub mod pipeline;
pub mod seq;
pub mod similarity;
pub mod utils;

pub use error::{KmerSimError, Result};

pub mod prelude {
    pub use crate::error::{KmerSimError, Result};
    pub use crate::index::{IndexEntry, SampleIndexReader, SampleIndexWriter, StreamEnd};
    pub use crate::join::{JoinedRow, KmerJoiner, KmerStream};
    pub use crate::partition::{KmerRangePartition, PartitionAlgorithm, PartitionTable};
    pub use crate::seq::{KmerKey, KmerWindows};
    pub use crate::similarity::{ScoreAlgorithm, Scorer, SimilarityMatrix, WeightAlgorithm};
    pub use crate::utils::{IndexParams, SampleDict, SimilarityParams};
}
