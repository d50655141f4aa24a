//! Error type shared by the library.
//!
//! End of a reader's partition range is not an error, see [`crate::index::StreamEnd`].

use thiserror::Error;

/// Errors raised by codec, index store, partitioner and similarity computations.
#[derive(Debug, Error)]
pub enum KmerSimError {
    /// a symbol outside {A,C,G,T} reached the codec
    #[error("invalid symbol {symbol:?} at position {position}")]
    InvalidSymbol { symbol: char, position: usize },

    /// chunk count mismatch, keys out of order, truncated or unreadable chunk
    #[error("corrupt index : {0}")]
    CorruptIndex(String),

    /// weighting, score or filter algorithm name not recognized
    #[error("unknown algorithm : {0}")]
    UnknownAlgorithm(String),

    /// parameter values that cannot be used (kmer size, partition number ...)
    #[error("invalid configuration : {0}")]
    Config(String),

    #[error("io error : {0}")]
    Io(#[from] std::io::Error),

    #[error("json error : {0}")]
    Json(#[from] serde_json::Error),

    #[error("csv error : {0}")]
    Csv(#[from] csv::Error),
} // end of KmerSimError

pub type Result<T> = std::result::Result<T, KmerSimError>;

impl KmerSimError {
    /// a short io read past the end of a chunk means the chunk was truncated
    pub(crate) fn from_chunk_read(err: std::io::Error, what: &str) -> Self {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            KmerSimError::CorruptIndex(format!("truncated chunk while reading {}", what))
        } else {
            KmerSimError::Io(err)
        }
    }
} // end of impl KmerSimError
