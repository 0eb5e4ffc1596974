use thiserror::Error;

/// Errors surfaced by the classifier's ambient stack.
///
/// Data-plane outcomes (parse failures, "not BitTorrent") are never errors —
/// they are `Verdict::Allow`. Only initialization and ban/cleanup I/O
/// produce an `Err` here.
#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("failed to initialize: {0}")]
    Init(String),

    #[error("failed to ban source IP: {detail}")]
    Ban { detail: String },

    #[error("cleanup sweep failed to remove {failed_count} expired entries")]
    Cleanup { failed_count: usize },
}

pub type Result<T> = std::result::Result<T, ClassifierError>;
