use std::io;

use thiserror::Error;

/// Failures from the page-browsing side: loading, refreshing, selector parsing.
#[derive(Debug, Error)]
pub enum BrowseError {
    #[error("no page loaded; call load() first")]
    NotLoaded,
    #[error("invalid page url '{0}'")]
    BadUrl(String),
    #[error("invalid selector '{selector}': {reason}")]
    Selector { selector: String, reason: String },
    #[error("page request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

/// Document retrieval and text conversion.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("retrieval of {url} failed: {reason}")]
    Retrieval { url: String, reason: String },
    #[error("document at {url} could not be decoded: {reason}")]
    Parse { url: String, reason: String },
}

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("delivery request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("delivery endpoint rejected message: {0}")]
    Rejected(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("state file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Load(#[from] config::ConfigError),
    #[error("identifier registry is empty")]
    EmptyRegistry,
    #[error("identifier '{0}' is not a plain digit string")]
    BadIdentifier(String),
    #[error("identifier '{0}' is listed more than once")]
    DuplicateIdentifier(String),
    #[error("poll interval must be greater than zero")]
    ZeroInterval,
}

/// Everything that can end a single poll cycle early. All of these are
/// transient: the loop logs them and tries again on the next cycle.
#[derive(Debug, Error)]
pub enum CycleFault {
    #[error("tracked link not found on page")]
    LinkNotFound,
    #[error("marker text missing or empty")]
    MarkerUnavailable,
    #[error("tracked link has no href")]
    LinkMissing,
    #[error(transparent)]
    Browse(#[from] BrowseError),
    #[error(transparent)]
    Document(#[from] ExtractError),
    #[error(transparent)]
    Delivery(#[from] DeliveryError),
    #[error("marker {marker} delivered but not saved: {source}")]
    Persist {
        marker: String,
        #[source]
        source: StoreError,
    },
}

impl CycleFault {
    /// Short label for log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            CycleFault::LinkNotFound | CycleFault::MarkerUnavailable | CycleFault::LinkMissing => {
                "page"
            }
            CycleFault::Browse(_) => "browse",
            CycleFault::Document(ExtractError::Retrieval { .. }) => "retrieval",
            CycleFault::Document(ExtractError::Parse { .. }) => "parse",
            CycleFault::Delivery(_) => "delivery",
            CycleFault::Persist { .. } => "persist",
        }
    }
}
