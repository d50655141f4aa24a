//! Key space partitioning : sampled prefix histogram and range partitioners.

pub mod histogram;
pub mod partitioner;

pub use histogram::{KmerHistogram, KmerHistogramRecord, SAMPLING_CHARS};
pub use partitioner::{
    compute_equal_area_partitions, compute_equal_range_partitions, compute_histogram_partitions, KmerRangePartition,
    PartitionTable,
};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::KmerSimError;

/// How partitions are computed when building indexes.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PartitionAlgorithm {
    EqualRange,
    EqualArea,
    Histogram,
}

impl FromStr for PartitionAlgorithm {
    type Err = KmerSimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "range" | "equalrange" => Ok(PartitionAlgorithm::EqualRange),
            "area" | "equalarea" => Ok(PartitionAlgorithm::EqualArea),
            "histogram" | "histo" => Ok(PartitionAlgorithm::Histogram),
            _ => Err(KmerSimError::UnknownAlgorithm(format!("partitioning {}", s))),
        }
    }
}

impl fmt::Display for PartitionAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PartitionAlgorithm::EqualRange => "range",
            PartitionAlgorithm::EqualArea => "area",
            PartitionAlgorithm::Histogram => "histogram",
        };
        write!(f, "{}", name)
    }
}
