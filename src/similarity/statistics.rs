//! Per sample weight statistics, computed while the sample index is written.
//!
//! They give the per sample parameters of the scorers : weight sums for Bray-Curtis and
//! Jensen-Shannon, L2 norms for cosine.

use std::fs::OpenOptions;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

use super::weight::WeightAlgorithm;

pub const STATISTICS_NAME: &str = "statistics.json";

#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WeightSums {
    pub sum: f64,
    pub square_sum: f64,
}

impl WeightSums {
    fn add(&mut self, weight: f64) {
        self.sum += weight;
        self.square_sum += weight * weight;
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct KmerStatistics {
    pub name: String,
    /// number of distinct kmers indexed
    pub unique_kmers: u64,
    /// sum of frequencies of indexed kmers
    pub total_kmers: u64,
    pub boolean: WeightSums,
    pub natural: WeightSums,
    pub logarithm: WeightSums,
}

impl KmerStatistics {
    pub fn new(name: &str) -> Self {
        KmerStatistics { name: name.to_string(), ..Default::default() }
    }

    /// accounts for one indexed kmer
    pub fn add(&mut self, frequency: u64) {
        if frequency == 0 {
            return;
        }
        self.unique_kmers += 1;
        self.total_kmers += frequency;
        self.boolean.add(WeightAlgorithm::Boolean.tf_weight(frequency));
        self.natural.add(WeightAlgorithm::Natural.tf_weight(frequency));
        self.logarithm.add(WeightAlgorithm::Logarithm.tf_weight(frequency));
    }

    fn sums(&self, algo: WeightAlgorithm) -> &WeightSums {
        match algo {
            WeightAlgorithm::Boolean => &self.boolean,
            WeightAlgorithm::Natural => &self.natural,
            WeightAlgorithm::Logarithm => &self.logarithm,
        }
    }

    pub fn get_weight_sum(&self, algo: WeightAlgorithm) -> f64 {
        self.sums(algo).sum
    }

    /// L2 norm of the weight vector of the sample
    pub fn get_cosine_norm_base(&self, algo: WeightAlgorithm) -> f64 {
        self.sums(algo).square_sum.sqrt()
    }

    pub fn dump_json(&self, dirpath: &Path) -> Result<()> {
        let filepath = dirpath.join(STATISTICS_NAME);
        log::debug!("dumping statistics of {} in {:?}", self.name, filepath);
        let file = OpenOptions::new().write(true).create(true).truncate(true).open(&filepath)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, &self)?;
        writer.flush()?;
        Ok(())
    }

    pub fn reload_json(dirpath: &Path) -> Result<Self> {
        let filepath = dirpath.join(STATISTICS_NAME);
        let file = OpenOptions::new().read(true).open(&filepath)?;
        let stats: KmerStatistics = serde_json::from_reader(BufReader::new(file))?;
        Ok(stats)
    }
} // end of impl KmerStatistics

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statistics_sums() {
        let mut stats = KmerStatistics::new("s");
        for f in [1u64, 10, 100, 0] {
            stats.add(f);
        }
        assert_eq!(stats.unique_kmers, 3);
        assert_eq!(stats.total_kmers, 111);
        assert_eq!(stats.get_weight_sum(WeightAlgorithm::Boolean), 3.);
        assert!((stats.get_weight_sum(WeightAlgorithm::Logarithm) - 6.).abs() < 1.0e-12);
        assert!((stats.get_cosine_norm_base(WeightAlgorithm::Natural) - 10101f64.sqrt()).abs() < 1.0e-9);
        //
        let dir = tempfile::tempdir().unwrap();
        stats.dump_json(dir.path()).unwrap();
        assert_eq!(KmerStatistics::reload_json(dir.path()).unwrap(), stats);
    }
}
