//! Error taxonomy.
//!
//! [`ConfigError`] is fatal and only raised while starting up.
//! [`SearchError`] is raised per request and aborts that request's pipeline.
//! [`Timeout`] marks an external call that ran past its deadline; adapters
//! put it at the root of the error they return.

use std::path::PathBuf;

use thiserror::Error;

/// Bad or missing static configuration. Prevents startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed {what} document: {source}")]
    Parse {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid vocabulary: {0}")]
    Vocabulary(String),

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("{0} environment variable not set")]
    MissingCredential(&'static str),
}

/// An external call did not answer within its configured timeout.
#[derive(Debug, Error)]
#[error("{service} request timed out")]
pub struct Timeout {
    pub service: &'static str,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl Timeout {
    pub fn new(service: &'static str) -> Self {
        Self {
            service,
            source: None,
        }
    }

    /// Timeout that keeps the transport error as its source.
    pub fn caused_by(
        service: &'static str,
        source: impl Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
    ) -> Self {
        Self {
            service,
            source: Some(source.into()),
        }
    }
}

/// A failed search request. Partial results are never produced.
#[derive(Debug, Error)]
pub enum SearchError {
    /// The language model call failed, timed out, or returned output that
    /// does not have the structured query shape.
    #[error("query extraction failed: {0:#}")]
    Extraction(#[source] anyhow::Error),

    /// The vector index call failed.
    #[error("retrieval failed: {0:#}")]
    Retrieval(#[source] anyhow::Error),
}

impl SearchError {
    /// Short machine-readable name of the failing stage.
    pub fn stage(&self) -> &'static str {
        match self {
            SearchError::Extraction(_) => "extraction",
            SearchError::Retrieval(_) => "retrieval",
        }
    }

    /// True when a [`Timeout`] sits anywhere in the source chain.
    pub fn is_timeout(&self) -> bool {
        let inner = match self {
            SearchError::Extraction(e) | SearchError::Retrieval(e) => e,
        };
        inner.downcast_ref::<Timeout>().is_some()
            || inner.chain().any(|cause| cause.is::<Timeout>())
    }
}
