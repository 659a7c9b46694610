pub mod config;
pub mod error;
pub mod lexicon;
pub mod types;

pub use config::{BackfillConfig, CoverageConfig, FilterConfig, ScoreWeights};
pub use error::LotlineError;
pub use types::*;
