//! Score accumulation over joined rows : cosine, Bray-Curtis, Jensen-Shannon.
//!
//! Each algorithm is a pair of pure functions (row contribution, final transform) selected by
//! [ScoreAlgorithm]. Per sample parameters come from [KmerStatistics] :
//!  - cosine : L2 norm of the sample weights
//!  - Bray-Curtis : sum of the sample weights
//!  - Jensen-Shannon : 1, raw weights are compared and the accumulated divergence is the final score

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{KmerSimError, Result};
use crate::join::JoinedRow;

use super::matrix::SimilarityMatrix;
use super::statistics::KmerStatistics;
use super::weight::WeightAlgorithm;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScoreAlgorithm {
    Cosine,
    BrayCurtis,
    JensenShannon,
}

impl ScoreAlgorithm {
    pub const ALL: [ScoreAlgorithm; 3] = [ScoreAlgorithm::Cosine, ScoreAlgorithm::BrayCurtis, ScoreAlgorithm::JensenShannon];
}

impl FromStr for ScoreAlgorithm {
    type Err = KmerSimError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cosine" | "cossim" | "cos" | "cs" => Ok(ScoreAlgorithm::Cosine),
            "braycurtis" | "bray" | "bc" => Ok(ScoreAlgorithm::BrayCurtis),
            "jensenshannon" | "jensen" | "jensha" | "js" => Ok(ScoreAlgorithm::JensenShannon),
            _ => Err(KmerSimError::UnknownAlgorithm(format!("score {}", s))),
        }
    }
}

impl fmt::Display for ScoreAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScoreAlgorithm::Cosine => "cosine",
            ScoreAlgorithm::BrayCurtis => "braycurtis",
            ScoreAlgorithm::JensenShannon => "jensenshannon",
        };
        write!(f, "{}", name)
    }
}

//=====================================================================================

/// cosine : product of normalized weights for every pair of samples present in the row
fn cosine_contribution(matrix: &mut SimilarityMatrix, weights: &[f64], present: &[usize], params: &[f64]) {
    for &i in present {
        let wi = weights[i] / params[i];
        for &j in present {
            matrix.add(i, j, wi * weights[j] / params[j]);
        }
    }
}

/// Bray-Curtis : |w_i - w_j| / (sum_i + sum_j). Pairs with one absent sample contribute too.
fn bray_curtis_contribution(matrix: &mut SimilarityMatrix, weights: &[f64], present: &[usize], params: &[f64]) {
    for &i in present {
        for j in 0..weights.len() {
            let denom = params[i] + params[j];
            if i == j || denom <= 0. {
                continue;
            }
            let v = (weights[i] - weights[j]).abs() / denom;
            matrix.add(i, j, v);
            // cell (j,i) is not reached from j when j is absent
            if weights[j] == 0. {
                matrix.add(j, i, v);
            }
        }
    }
}

#[inline]
fn js_term(p: f64, avg: f64) -> f64 {
    if p > 0. {
        p * (p / avg).log2()
    } else {
        0.
    }
}

/// Jensen-Shannon : half sum of p log2(p / avg) over both samples, skipping pairs with avg == 0
fn jensen_shannon_contribution(matrix: &mut SimilarityMatrix, weights: &[f64], present: &[usize], params: &[f64]) {
    for &i in present {
        let pi = weights[i] / params[i];
        for j in 0..weights.len() {
            if i == j {
                continue;
            }
            let pj = if weights[j] > 0. { weights[j] / params[j] } else { 0. };
            let avg = (pi + pj) / 2.;
            if avg == 0. {
                continue;
            }
            let v = (js_term(pi, avg) + js_term(pj, avg)) / 2.;
            matrix.add(i, j, v);
            if weights[j] == 0. {
                matrix.add(j, i, v);
            }
        }
    }
}

/// dissimilarity to similarity
fn bray_curtis_finalize(score: f64) -> f64 {
    (1. - score).clamp(0., 1.)
}

fn clamp_finalize(score: f64) -> f64 {
    score.clamp(0., 1.)
}

fn identity_finalize(score: f64) -> f64 {
    score
}

//=====================================================================================

/// Accumulates joined rows into a matrix with one score algorithm and one weighting.
#[derive(Clone, Debug)]
pub struct Scorer {
    algo: ScoreAlgorithm,
    weight: WeightAlgorithm,
    params: Vec<f64>,
}

impl Scorer {
    pub fn new(algo: ScoreAlgorithm, weight: WeightAlgorithm) -> Self {
        Scorer { algo, weight, params: Vec::new() }
    }

    pub fn get_algo(&self) -> ScoreAlgorithm {
        self.algo
    }

    pub fn get_weight_algo(&self) -> WeightAlgorithm {
        self.weight
    }

    pub fn get_nb_samples(&self) -> usize {
        self.params.len()
    }

    /// one parameter per sample, see module doc. A sample with a null parameter has no kmer and contributes nothing.
    pub fn set_params(&mut self, params: Vec<f64>) -> Result<()> {
        if let Some(bad) = params.iter().find(|p| !p.is_finite() || **p < 0.) {
            return Err(KmerSimError::Config(format!("bad scorer parameter {}", bad)));
        }
        self.params = params;
        Ok(())
    }

    /// parameters from the statistics of all samples, in sample rank order
    pub fn set_params_from_statistics(&mut self, statistics: &[KmerStatistics]) -> Result<()> {
        let params = statistics
            .iter()
            .map(|s| match self.algo {
                ScoreAlgorithm::Cosine => s.get_cosine_norm_base(self.weight),
                ScoreAlgorithm::BrayCurtis => s.get_weight_sum(self.weight),
                ScoreAlgorithm::JensenShannon => 1.,
            })
            .collect();
        self.set_params(params)
    }

    // zeroes the weights of samples without parameter, returns the samples present
    fn clean_weights(&self, weights: &mut [f64]) -> Vec<usize> {
        let mut present = Vec::new();
        for (i, w) in weights.iter_mut().enumerate() {
            if *w > 0. && self.params[i] > 0. {
                present.push(i);
            } else {
                *w = 0.;
            }
        }
        present
    }

    fn check_sizes(&self, matrix: &SimilarityMatrix, nb_weights: usize) -> Result<()> {
        if nb_weights != self.params.len() || matrix.get_nb_samples() != self.params.len() {
            return Err(KmerSimError::Config(format!(
                "scorer set for {} samples, got row of {} and matrix of {}",
                self.params.len(),
                nb_weights,
                matrix.get_nb_samples()
            )));
        }
        Ok(())
    }

    fn dispatch(&self, matrix: &mut SimilarityMatrix, weights: &[f64], present: &[usize]) {
        match self.algo {
            ScoreAlgorithm::Cosine => cosine_contribution(matrix, weights, present, &self.params),
            ScoreAlgorithm::BrayCurtis => bray_curtis_contribution(matrix, weights, present, &self.params),
            ScoreAlgorithm::JensenShannon => jensen_shannon_contribution(matrix, weights, present, &self.params),
        }
    }

    /// accumulates one row given as dense weights, 0 for absent samples
    pub fn contribute_score(&self, matrix: &mut SimilarityMatrix, weights: &[f64]) -> Result<()> {
        self.check_sizes(matrix, weights.len())?;
        let mut weights = weights.to_vec();
        let present = self.clean_weights(&mut weights);
        self.dispatch(matrix, &weights, &present);
        Ok(())
    }

    /// weights the frequencies of a joined row and accumulates it. weights is a scratch buffer reused between rows.
    pub fn contribute_row(&self, matrix: &mut SimilarityMatrix, row: &JoinedRow, weights: &mut Vec<f64>) -> Result<()> {
        self.check_sizes(matrix, self.params.len())?;
        weights.clear();
        weights.resize(self.params.len(), 0.);
        for (sample, frequency) in &row.values {
            if *sample >= weights.len() {
                return Err(KmerSimError::Config(format!("row sample {} out of range", sample)));
            }
            weights[*sample] = self.weight.tf_weight(*frequency);
        }
        let present = self.clean_weights(weights);
        self.dispatch(matrix, weights, &present);
        Ok(())
    } // end of contribute_row

    pub fn finalize(&self, score: f64) -> f64 {
        match self.algo {
            ScoreAlgorithm::BrayCurtis => bray_curtis_finalize(score),
            ScoreAlgorithm::Cosine => clamp_finalize(score),
            ScoreAlgorithm::JensenShannon => identity_finalize(score),
        }
    }
} // end of impl Scorer

//=====================================================================================

// end of mod tests
