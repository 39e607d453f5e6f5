use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::crawler::status::StatusError;

/// Stage of the crawl an error came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    Downloader,
    Analyzer,
    Pipeline,
    Scheduler,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Downloader => write!(f, "downloader error"),
            Self::Analyzer => write!(f, "analyzer error"),
            Self::Pipeline => write!(f, "pipeline error"),
            Self::Scheduler => write!(f, "scheduler error"),
        }
    }
}

/// Crawl-time failure of a single request, response or item.
///
/// These never stop the scheduler; they are routed into the error pool and
/// surface through `Scheduler::error_chan`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("crawler error: {kind}: {message}")]
pub struct CrawlerError {
    kind: ErrorKind,
    message: String,
}

impl CrawlerError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into().trim().to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Errors returned by the scheduler core
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Bad configuration, malformed MID, missing module and the like
    #[error("illegal parameter: {0}")]
    IllegalParameter(String),

    #[error("closed buffer")]
    ClosedBuffer,

    #[error("closed buffer pool")]
    ClosedPool,

    /// No instance of the requested module category is registered
    #[error("not found module instance")]
    ModuleNotFound,

    /// Illegal lifecycle transition
    #[error("crawler error: scheduler error: {0}")]
    Status(#[from] StatusError),

    #[error(transparent)]
    Crawler(#[from] CrawlerError),
}

impl Error {
    pub fn illegal_parameter(message: impl Into<String>) -> Self {
        Self::IllegalParameter(message.into().trim().to_string())
    }

    /// Convert into a crawl-time error, classifying anything that is not one
    /// already under the given kind.
    pub fn into_crawler_error(self, kind: ErrorKind) -> CrawlerError {
        match self {
            Self::Crawler(e) => e,
            other => CrawlerError::new(kind, other.to_string()),
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crawler_error_message() {
        let err = CrawlerError::new(ErrorKind::Downloader, "  connection refused \n");
        assert_eq!(err.message(), "connection refused");
        assert_eq!(
            err.to_string(),
            "crawler error: downloader error: connection refused"
        );
    }

    #[test]
    fn test_into_crawler_error_keeps_existing_kind() {
        let err = Error::from(CrawlerError::new(ErrorKind::Pipeline, "disk full"));
        let converted = err.into_crawler_error(ErrorKind::Scheduler);
        assert_eq!(converted.kind(), ErrorKind::Pipeline);

        let converted = Error::illegal_parameter("nil response").into_crawler_error(ErrorKind::Analyzer);
        assert_eq!(converted.kind(), ErrorKind::Analyzer);
        assert_eq!(converted.message(), "illegal parameter: nil response");
    }
}
