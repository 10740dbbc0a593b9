use std::fmt;

/// Failure of a single provider attempt. One tier failing falls through to
/// the next; only the orchestrator decides when resolution as a whole fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// Network-level failure (DNS, connect, timeout).
    Network(String),
    /// Unexpected HTTP status.
    Http(u16),
    /// Provider rejected us for quota/auth reasons.
    RateLimited,
    /// Well-formed response, zero candidates.
    NotFound,
    /// Response body did not match the expected shape.
    Parse(String),
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network(msg) => write!(f, "network error: {msg}"),
            Self::Http(status) => write!(f, "unexpected HTTP status {status}"),
            Self::RateLimited => write!(f, "rate limited or forbidden by provider"),
            Self::NotFound => write!(f, "address not found"),
            Self::Parse(msg) => write!(f, "malformed response: {msg}"),
        }
    }
}

impl std::error::Error for ProviderError {}

/// The whole waterfall came up empty for a query.
#[derive(Debug)]
pub enum GeocodeError {
    Exhausted {
        query: String,
        last: Option<ProviderError>,
    },
}

impl fmt::Display for GeocodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exhausted { query, last } => match last {
                Some(err) => write!(f, "all geocoding providers failed for '{query}': {err}"),
                None => write!(f, "no geocoding provider produced a result for '{query}'"),
            },
        }
    }
}

impl std::error::Error for GeocodeError {}
