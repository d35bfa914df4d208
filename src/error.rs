use thiserror::Error;

#[derive(Debug, Error)]
pub enum EnrichError {
    #[error("annotation mismatch: {0}")]
    AnnotationMismatch(String),

    #[error("merge incomplete: {found} {what} survived, at least {minimum} required")]
    MergeIncomplete {
        what: &'static str,
        found: usize,
        minimum: usize,
    },

    #[error("parse incomplete: {0}")]
    ParseIncomplete(String),

    #[error("insufficient categories: {0}")]
    InsufficientCategories(String),

    #[error("result batch is empty: {0}")]
    EmptyBatch(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("missing column: {0}")]
    MissingColumn(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, EnrichError>;
