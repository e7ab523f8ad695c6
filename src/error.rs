//! Error taxonomy for a digest run.
//!
//! [`Error`] covers everything that can end a run (or a stage of it).
//! Per-article enhancement failures live in [`EnhanceFailure`] because they are
//! recorded in the run report instead of propagated.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("missing credential: {0} is not set")]
    MissingCredential(&'static str),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("news service rejected the request (status {status}): {body}")]
    NewsServiceRejected { status: u16, body: String },

    #[error("news service unavailable after {attempts} attempt(s): {last}")]
    NewsServiceUnavailable { attempts: usize, last: String },

    #[error("could not decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("failed to write {path}: {source}")]
    WriteFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid run transition from {from:?} to {to:?}")]
    InvalidTransition {
        from: crate::orchestrator::RunState,
        to: crate::orchestrator::RunState,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("could not open digest issue: {0}")]
    Publish(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Why a single article could not be enhanced.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EnhanceFailure {
    /// Timeout, transport error, rate limit or server error. Worth another attempt.
    #[error("transient failure: {0}")]
    Retryable(String),

    #[error("generative service rejected the request (status {status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("content filtered: {0}")]
    ContentFiltered(String),

    #[error("generative service returned no text")]
    EmptyGeneration,

    #[error("gave up after {attempts} attempt(s): {last}")]
    Exhausted { attempts: usize, last: String },
}

impl EnhanceFailure {
    pub fn is_retryable(&self) -> bool {
        matches!(self, EnhanceFailure::Retryable(_))
    }
}
