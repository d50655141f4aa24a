//! Frequency pre-filter applied to a sample's kmer counts before they are written.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::KmerSimError;

/// How per sample frequency bounds are derived from the count statistics.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterAlgorithm {
    /// keep every kmer seen
    None,
    /// drop kmers seen once
    NotUnique,
    /// keep frequencies within one standard deviation of the mean
    Stddev,
    /// keep frequencies within two standard deviations of the mean
    Stddev2,
}

impl Default for FilterAlgorithm {
    fn default() -> Self {
        FilterAlgorithm::None
    }
}

impl FromStr for FilterAlgorithm {
    type Err = KmerSimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" | "no" => Ok(FilterAlgorithm::None),
            "notunique" | "nu" => Ok(FilterAlgorithm::NotUnique),
            "stddev" | "sd" => Ok(FilterAlgorithm::Stddev),
            "stddev2" | "sd2" => Ok(FilterAlgorithm::Stddev2),
            _ => Err(KmerSimError::UnknownAlgorithm(format!("filter {}", s))),
        }
    }
}

impl fmt::Display for FilterAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FilterAlgorithm::None => "none",
            FilterAlgorithm::NotUnique => "notunique",
            FilterAlgorithm::Stddev => "stddev",
            FilterAlgorithm::Stddev2 => "stddev2",
        };
        write!(f, "{}", name)
    }
}

/// Count statistics of one sample.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct KmerFilterStats {
    /// sum of frequencies
    pub total: u64,
    /// number of distinct kmers
    pub unique: u64,
    /// sum of squared frequencies
    pub square_sum: f64,
}

impl KmerFilterStats {
    pub fn add(&mut self, frequency: u64) {
        self.total += frequency;
        self.unique += 1;
        self.square_sum += (frequency as f64) * (frequency as f64);
    }

    pub fn from_frequencies<I: IntoIterator<Item = u64>>(frequencies: I) -> Self {
        let mut stats = KmerFilterStats::default();
        for f in frequencies {
            stats.add(f);
        }
        stats
    }

    pub fn mean(&self) -> f64 {
        if self.unique == 0 {
            0.
        } else {
            self.total as f64 / self.unique as f64
        }
    }

    pub fn stddev(&self) -> f64 {
        if self.unique == 0 {
            return 0.;
        }
        let mean = self.mean();
        (self.square_sum / self.unique as f64 - mean * mean).max(0.).sqrt()
    }

    /// inclusive frequency bounds [min, max] kept by algo
    pub fn bounds(&self, algo: FilterAlgorithm) -> (u64, u64) {
        let stddev_bounds = |nb_sd: f64| {
            let mean = self.mean();
            let sd = nb_sd * self.stddev();
            let min = (mean - sd).max(0.).ceil() as u64;
            let max = (mean + sd).floor() as u64;
            (min.max(1), max)
        };
        match algo {
            FilterAlgorithm::None => (1, u64::MAX),
            FilterAlgorithm::NotUnique => (2, u64::MAX),
            FilterAlgorithm::Stddev => stddev_bounds(1.),
            FilterAlgorithm::Stddev2 => stddev_bounds(2.),
        }
    } // end of bounds
} // end of impl KmerFilterStats

/// Frequency bounds ready to be applied.
#[derive(Copy, Clone, Debug)]
pub struct KmerFilter {
    min: u64,
    max: u64,
}

impl KmerFilter {
    pub fn new(algo: FilterAlgorithm, stats: &KmerFilterStats) -> Self {
        let (min, max) = stats.bounds(algo);
        log::debug!(
            "filter {} : mean {:.3e}, stddev {:.3e}, bounds [{}, {}]",
            algo,
            stats.mean(),
            stats.stddev(),
            min,
            max
        );
        KmerFilter { min, max }
    }

    #[inline]
    pub fn keep(&self, frequency: u64) -> bool {
        frequency >= self.min && frequency <= self.max
    }
}

// end of mod tests
