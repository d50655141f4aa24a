//! Dense sample x sample score matrix.

use std::path::{Path, PathBuf};

use crate::error::{KmerSimError, Result};

use super::score::Scorer;

/// Row major S x S matrix of accumulated scores.
///
/// Partial matrices are accumulated per partition, merged by element wise sum, then finalized once.
#[derive(Clone, Debug, PartialEq)]
pub struct SimilarityMatrix {
    nb_samples: usize,
    data: Vec<f64>,
    finalized: bool,
}

impl SimilarityMatrix {
    pub fn new(nb_samples: usize) -> Self {
        SimilarityMatrix { nb_samples, data: vec![0.; nb_samples * nb_samples], finalized: false }
    }

    pub fn get_nb_samples(&self) -> usize {
        self.nb_samples
    }

    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.data[i * self.nb_samples + j]
    }

    #[inline]
    pub fn add(&mut self, i: usize, j: usize, value: f64) {
        self.data[i * self.nb_samples + j] += value;
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// adds other element wise
    pub fn merge(&mut self, other: &SimilarityMatrix) -> Result<()> {
        if other.nb_samples != self.nb_samples {
            return Err(KmerSimError::Config(format!(
                "cannot merge matrices of {} and {} samples",
                self.nb_samples, other.nb_samples
            )));
        }
        if self.finalized || other.finalized {
            return Err(KmerSimError::Config("cannot merge a finalized matrix".to_string()));
        }
        for (a, b) in self.data.iter_mut().zip(other.data.iter()) {
            *a += *b;
        }
        Ok(())
    }

    /// applies the scorer's final transform to every cell, only once
    pub fn finalize(&mut self, scorer: &Scorer) -> Result<()> {
        if self.finalized {
            return Err(KmerSimError::Config("matrix already finalized".to_string()));
        }
        for v in self.data.iter_mut() {
            *v = scorer.finalize(*v);
        }
        self.finalized = true;
        Ok(())
    }

    /// writes `row\tcol\tscore` lines, row major.
    ///
    /// Lines go to a temporary file renamed to path once complete, so that path exists only on success.
    pub fn write_tsv(&self, path: &Path) -> Result<()> {
        let tmp_path = temporary_path(path);
        let res = self.write_tsv_to(&tmp_path).and_then(|_| Ok(std::fs::rename(&tmp_path, path)?));
        if res.is_err() {
            let _ = std::fs::remove_file(&tmp_path);
        } else {
            log::info!("similarity matrix of {} samples written in {:?}", self.nb_samples, path);
        }
        res
    } // end of write_tsv

    fn write_tsv_to(&self, path: &Path) -> Result<()> {
        let mut writer = csv::WriterBuilder::new().delimiter(b'\t').has_headers(false).from_path(path)?;
        for i in 0..self.nb_samples {
            for j in 0..self.nb_samples {
                let score = self.get(i, j);
                writer.write_record(&[i.to_string(), j.to_string(), score.to_string()])?;
            }
        }
        writer.flush()?;
        Ok(())
    }
} // end of impl SimilarityMatrix

fn temporary_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::similarity::{ScoreAlgorithm, WeightAlgorithm};

    #[test]
    fn merge_and_write() {
        let mut m1 = SimilarityMatrix::new(2);
        m1.add(0, 1, 0.25);
        let mut m2 = SimilarityMatrix::new(2);
        m2.add(0, 1, 0.5);
        m2.add(1, 1, 3.);
        m1.merge(&m2).unwrap();
        assert_eq!(m1.get(0, 1), 0.75);
        assert!(m1.merge(&SimilarityMatrix::new(3)).is_err());
        //
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("matrix.tsv");
        m1.write_tsv(&path).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "0\t0\t0\n0\t1\t0.75\n1\t0\t0\n1\t1\t3\n");
        assert!(!temporary_path(&path).exists());
    }

    #[test]
    fn finalize_once() {
        let scorer = Scorer::new(ScoreAlgorithm::BrayCurtis, WeightAlgorithm::Natural);
        let mut m = SimilarityMatrix::new(1);
        m.finalize(&scorer).unwrap();
        assert_eq!(m.get(0, 0), 1.);
        assert!(m.finalize(&scorer).is_err());
    }

    #[test]
    fn failed_write_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing_dir").join("matrix.tsv");
        assert!(SimilarityMatrix::new(2).write_tsv(&path).is_err());
        assert!(!path.exists());
    }
} // end of mod tests
