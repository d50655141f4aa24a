//! The list of samples of a computation. The rank of a sample in the dictionary is its row in the score matrix.

use std::fs::OpenOptions;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{KmerSimError, Result};

pub const SAMPLES_NAME: &str = "samples.json";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleId {
    /// rank of sample, its row and column in the matrix
    rank: usize,
    name: String,
    /// file the sample was read from
    path: String,
}

impl SampleId {
    pub fn new(rank: usize, name: &str, path: &str) -> Self {
        SampleId { rank, name: name.to_string(), path: path.to_string() }
    }

    pub fn get_rank(&self) -> usize {
        self.rank
    }

    pub fn get_name(&self) -> &str {
        &self.name
    }

    pub fn get_path(&self) -> &str {
        &self.path
    }
} // end of impl SampleId

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleDict(pub Vec<SampleId>);

impl SampleDict {
    pub fn new(size: usize) -> Self {
        SampleDict(Vec::with_capacity(size))
    }

    /// one sample per file, in file order
    pub fn from_files(files: &[PathBuf]) -> Self {
        let samples = files
            .iter()
            .enumerate()
            .map(|(rank, path)| SampleId::new(rank, &super::files::sample_name(path), &path.to_string_lossy()))
            .collect();
        SampleDict(samples)
    }

    pub fn get_nb_samples(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, rank: usize) -> Option<&SampleId> {
        self.0.get(rank)
    }

    /// directory of the index of sample rank, under root
    pub fn sample_dir(root: &Path, rank: usize) -> PathBuf {
        root.join(format!("sample-{:05}", rank))
    }

    pub fn sample_dirs(&self, root: &Path) -> Vec<PathBuf> {
        (0..self.0.len()).map(|rank| SampleDict::sample_dir(root, rank)).collect()
    }

    pub fn dump(&self, dirpath: &Path) -> Result<()> {
        let filepath = dirpath.join(SAMPLES_NAME);
        log::info!("dumping sample dictionary in json file : {:?}", filepath);
        let file = OpenOptions::new().write(true).create(true).truncate(true).open(&filepath)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, &self)?;
        writer.flush()?;
        log::info!("SampleDict dumped, nb samples : {}", self.0.len());
        Ok(())
    } // end of dump

    pub fn reload(dirpath: &Path) -> Result<SampleDict> {
        let filepath = dirpath.join(SAMPLES_NAME);
        let file = OpenOptions::new().read(true).open(&filepath)?;
        let dict: SampleDict = serde_json::from_reader(BufReader::new(file))?;
        for (rank, sample) in dict.0.iter().enumerate() {
            if sample.rank != rank {
                return Err(KmerSimError::Config(format!(
                    "sample {} has rank {} at position {} in {:?}",
                    sample.name, sample.rank, rank, filepath
                )));
            }
        }
        if log::log_enabled!(log::Level::Debug) {
            for sample in dict.0.iter().take(3) {
                log::debug!("sample {} : {} ({})", sample.rank, sample.name, sample.path);
            }
        }
        log::info!("SampleDict, reloaded nb samples : {:?}", dict.0.len());
        Ok(dict)
    } // end of reload
} // end of impl SampleDict
