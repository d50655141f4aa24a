//! Term frequency weighting of kmer counts.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::KmerSimError;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WeightAlgorithm {
    /// 1 if kmer present
    Boolean,
    /// raw count
    Natural,
    /// 1 + log10(count)
    Logarithm,
}

impl WeightAlgorithm {
    pub const ALL: [WeightAlgorithm; 3] = [WeightAlgorithm::Boolean, WeightAlgorithm::Natural, WeightAlgorithm::Logarithm];

    /// weight of a kmer seen frequency times, 0 for an absent kmer
    #[inline]
    pub fn tf_weight(&self, frequency: u64) -> f64 {
        if frequency == 0 {
            return 0.;
        }
        match self {
            WeightAlgorithm::Boolean => 1.,
            WeightAlgorithm::Natural => frequency as f64,
            WeightAlgorithm::Logarithm => 1. + (frequency as f64).log10(),
        }
    }
}

impl Default for WeightAlgorithm {
    fn default() -> Self {
        WeightAlgorithm::Logarithm
    }
}

impl FromStr for WeightAlgorithm {
    type Err = KmerSimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "boolean" | "bool" => Ok(WeightAlgorithm::Boolean),
            "natural" | "nat" => Ok(WeightAlgorithm::Natural),
            "logarithm" | "log" | "logalithm" => Ok(WeightAlgorithm::Logarithm),
            _ => Err(KmerSimError::UnknownAlgorithm(format!("weighting {}", s))),
        }
    }
}

impl fmt::Display for WeightAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WeightAlgorithm::Boolean => "boolean",
            WeightAlgorithm::Natural => "natural",
            WeightAlgorithm::Logarithm => "logarithm",
        };
        write!(f, "{}", name)
    }
}

// end of mod tests
