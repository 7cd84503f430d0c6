// Error types for the Perspective client.
//
// The admission gate itself never fails; these cover construction
// parameters and everything that can go wrong around an HTTP call.
// A 429 gets its own variant so callers can tell "quota exhausted, try
// later" apart from a rejected request or a network failure.

/// Invalid configuration or construction parameters.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A quota window must allow at least one request.
    #[error("Quota limit must be at least 1")]
    ZeroLimit,

    /// A quota window must have a non-zero length.
    #[error("Quota period must be longer than zero")]
    ZeroPeriod,

    /// The API key was empty or missing.
    #[error("PERSPECTIVE_API_KEY not set")]
    MissingApiKey,

    /// An environment variable held a value that could not be parsed.
    #[error("Invalid value for {name}: {value:?}")]
    InvalidValue { name: &'static str, value: String },
}

/// Errors returned by [`Client::analyze`](crate::client::Client::analyze).
#[derive(Debug, thiserror::Error)]
pub enum PerspectiveError {
    /// The API answered 429. The client's admission gate has already been
    /// forced into exhaustion for a full window.
    #[error("Perspective API quota exceeded: {body}")]
    QuotaExceeded { body: String },

    /// Any other non-success response (bad key, malformed request, ...).
    #[error("Perspective API returned {status}: {body}")]
    Api { status: u16, body: String },

    /// The request never got a response.
    #[error("Failed to call Perspective API: {0}")]
    Transport(#[from] reqwest::Error),

    /// A 200 response whose body did not match the expected shape.
    #[error("Failed to parse Perspective API response: {source}")]
    Decode {
        #[source]
        source: serde_json::Error,
        body: String,
    },

    /// The request asked for no attributes; the API would reject it.
    #[error("At least one attribute must be requested")]
    NoAttributes,

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl PerspectiveError {
    /// True when the request was refused because the quota ran out.
    pub fn is_quota_exceeded(&self) -> bool {
        matches!(self, Self::QuotaExceeded { .. })
    }

    /// HTTP status code of the upstream response, if there was one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::QuotaExceeded { .. } => Some(429),
            Self::Api { status, .. } => Some(*status),
            Self::Transport(err) => err.status().map(|s| s.as_u16()),
            Self::Decode { .. } => Some(200),
            Self::NoAttributes | Self::Config(_) => None,
        }
    }
}
