use thiserror::Error;

#[derive(Error, Debug)]
pub enum LotlineError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Collector error: {0}")]
    Collector(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}
