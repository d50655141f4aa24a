//! Multi sample merge join.

pub mod joiner;

pub use joiner::{JoinState, JoinedRow, KmerJoiner, KmerStream};
