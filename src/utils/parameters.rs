//! structures related to processing parameters

use std::fs::OpenOptions;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::to_writer;

use crate::error::{KmerSimError, Result};
use crate::index::FilterAlgorithm;
use crate::partition::PartitionAlgorithm;
use crate::seq::{check_kmer_size, key_space_size};
use crate::similarity::{ScoreAlgorithm, WeightAlgorithm};

pub const PARAMETERS_NAME: &str = "parameters.json";
pub const SIMILARITY_PARAMETERS_NAME: &str = "similarity_parameters.json";

/// default maximum number of entries in a chunk file
pub const DEFAULT_CHUNK_ENTRIES: u64 = 5_000_000;

/// default number of reads per sample used to build the histogram
pub const DEFAULT_HISTOGRAM_READS: usize = 100_000;

fn dump_json_file<T: Serialize>(value: &T, filepath: &Path) -> Result<()> {
    let file = OpenOptions::new().write(true).create(true).truncate(true).open(filepath)?;
    let mut writer = BufWriter::new(file);
    to_writer(&mut writer, value)?;
    writer.flush()?;
    Ok(())
}

//=========================================================================================

/// Parameters of index construction.
/// The similarity computation needs them to read indexes back, so they are dumped in the index root.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IndexParams {
    kmer_size: usize,
    nb_partitions: usize,
    /// a chunk is closed when it reaches this number of entries
    max_entries_per_chunk: u64,
    partition_algo: PartitionAlgorithm,
    filter: FilterAlgorithm,
    /// number of reads per sample sampled for the histogram
    histogram_reads: usize,
}

impl IndexParams {
    pub fn new(kmer_size: usize, nb_partitions: usize) -> Self {
        IndexParams {
            kmer_size,
            nb_partitions,
            max_entries_per_chunk: DEFAULT_CHUNK_ENTRIES,
            partition_algo: PartitionAlgorithm::Histogram,
            filter: FilterAlgorithm::None,
            histogram_reads: DEFAULT_HISTOGRAM_READS,
        }
    }

    pub fn with_max_entries_per_chunk(mut self, max_entries: u64) -> Self {
        self.max_entries_per_chunk = max_entries;
        self
    }

    pub fn with_partition_algo(mut self, algo: PartitionAlgorithm) -> Self {
        self.partition_algo = algo;
        self
    }

    pub fn with_filter(mut self, filter: FilterAlgorithm) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_histogram_reads(mut self, nb_reads: usize) -> Self {
        self.histogram_reads = nb_reads;
        self
    }

    /// returns kmer size
    pub fn get_kmer_size(&self) -> usize {
        self.kmer_size
    }

    pub fn get_nb_partitions(&self) -> usize {
        self.nb_partitions
    }

    pub fn get_max_entries_per_chunk(&self) -> u64 {
        self.max_entries_per_chunk
    }

    pub fn get_partition_algo(&self) -> PartitionAlgorithm {
        self.partition_algo
    }

    pub fn get_filter(&self) -> FilterAlgorithm {
        self.filter
    }

    pub fn get_histogram_reads(&self) -> usize {
        self.histogram_reads
    }

    /// fails on values no computation can run with
    pub fn check(&self) -> Result<()> {
        check_kmer_size(self.kmer_size)?;
        if self.nb_partitions == 0 || self.nb_partitions as u128 > key_space_size(self.kmer_size) {
            return Err(KmerSimError::Config(format!(
                "number of partitions {} not in 1..=4^{}",
                self.nb_partitions, self.kmer_size
            )));
        }
        if self.max_entries_per_chunk == 0 {
            return Err(KmerSimError::Config("max entries per chunk must be > 0".to_string()));
        }
        Ok(())
    }

    pub fn dump_json(&self, dirpath: &Path) -> Result<()> {
        let filepath = dirpath.join(PARAMETERS_NAME);
        log::info!("dumping IndexParams in json file : {:?}", filepath);
        dump_json_file(self, &filepath)
    } // end of dump_json

    /// reload from a json dump. Used by the similarity computation to read indexes with the parameters they were built with
    pub fn reload_json(dirpath: &Path) -> Result<Self> {
        log::info!("in reload_json");
        let filepath = dirpath.join(PARAMETERS_NAME);
        let file = OpenOptions::new().read(true).open(&filepath).map_err(|e| {
            log::error!("IndexParams reload_json : could not open file {:?}", filepath.as_os_str());
            e
        })?;
        let params: IndexParams = serde_json::from_reader(BufReader::new(file))?;
        params.check()?;
        log::info!("IndexParams reload, kmer size : {}, nb partitions : {}", params.kmer_size, params.nb_partitions);
        Ok(params)
    } // end of reload_json
} // end of impl IndexParams

//=========================================================================================

/// Choice of weighting and score. Algorithm names are checked when parsed, before any data is read.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimilarityParams {
    weight: WeightAlgorithm,
    score: ScoreAlgorithm,
}

impl Default for SimilarityParams {
    fn default() -> Self {
        SimilarityParams { weight: WeightAlgorithm::Logarithm, score: ScoreAlgorithm::Cosine }
    }
}

impl SimilarityParams {
    pub fn new(weight: WeightAlgorithm, score: ScoreAlgorithm) -> Self {
        SimilarityParams { weight, score }
    }

    /// parses algorithm names, fails with UnknownAlgorithm
    pub fn from_names(weight: &str, score: &str) -> Result<Self> {
        Ok(SimilarityParams { weight: weight.parse()?, score: score.parse()? })
    }

    pub fn get_weight(&self) -> WeightAlgorithm {
        self.weight
    }

    pub fn get_score(&self) -> ScoreAlgorithm {
        self.score
    }

    pub fn dump_json(&self, dirpath: &Path) -> Result<()> {
        let filepath = dirpath.join(SIMILARITY_PARAMETERS_NAME);
        log::info!("dumping SimilarityParams in json file : {:?}", filepath);
        dump_json_file(self, &filepath)
    }

    pub fn reload_json(dirpath: &Path) -> Result<Self> {
        let filepath = dirpath.join(SIMILARITY_PARAMETERS_NAME);
        let file = OpenOptions::new().read(true).open(&filepath)?;
        let params: SimilarityParams = serde_json::from_reader(BufReader::new(file))?;
        Ok(params)
    }
} // end of impl SimilarityParams

// end of mod tests
