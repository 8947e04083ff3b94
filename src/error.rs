use thiserror::Error;

#[derive(Error, Debug)]
pub enum AllocError {
    #[error("Out of memory: heap could not grow by {requested} bytes")]
    OutOfMemory { requested: usize },

    #[error("Failed to reserve {len} bytes of address space: {source}")]
    Reserve {
        len: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("Unknown search mode: {0} (expected first-fit, next-fit, best-fit, free-list or segregated-fit)")]
    UnknownMode(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Configuration parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AllocError>;
