//! Term frequency weighting, score accumulators, per sample statistics and the score matrix.

pub mod matrix;
pub mod score;
pub mod statistics;
pub mod weight;

pub use matrix::SimilarityMatrix;
pub use score::{ScoreAlgorithm, Scorer};
pub use statistics::{KmerStatistics, WeightSums, STATISTICS_NAME};
pub use weight::WeightAlgorithm;
