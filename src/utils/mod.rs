//! contains utils used in parsing sample files and dumping parameters

pub mod files;
pub mod parameters;
pub mod sampledict;

pub use files::*;
pub use parameters::*;
pub use sampledict::*;
