use std::fmt;

/// Rejected input on the evaluation path. Always per-record, never fatal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MalformedInput {
    /// Email address without a local-part/domain separator.
    Email { input: String },
    /// String that does not parse as an IPv4 or IPv6 address.
    Ip { input: String },
}

impl fmt::Display for MalformedInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MalformedInput::Email { input } => write!(f, "invalid email format: '{input}'"),
            MalformedInput::Ip { input } => write!(f, "invalid IP address: '{input}'"),
        }
    }
}

impl std::error::Error for MalformedInput {}

/// Failure to retrieve raw data from a remote source.
///
/// Malformed-but-received content is not a fetch error; the store's parser
/// decides what to do with the payload.
#[derive(Debug)]
pub enum FetchError {
    /// The request exceeded its time limit and was abandoned.
    Timeout,
    /// Connection-level failure (DNS, TLS, refused, reset).
    Transport(String),
    /// The source answered with a non-success HTTP status.
    HttpStatus(u16),
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::Timeout => write!(f, "request timed out"),
            FetchError::Transport(msg) => write!(f, "transport error: {msg}"),
            FetchError::HttpStatus(code) => write!(f, "HTTP status {code}"),
        }
    }
}

impl std::error::Error for FetchError {}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Timeout
        } else if let Some(status) = e.status() {
            FetchError::HttpStatus(status.as_u16())
        } else {
            FetchError::Transport(e.to_string())
        }
    }
}

/// Corrupt remote payload. Treated exactly like a fetch failure by the
/// refresh path: the stale snapshot is retained.
#[derive(Debug)]
pub struct ParseError {
    pub source_name: String,
    pub detail: String,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unparsable payload from '{}': {}", self.source_name, self.detail)
    }
}

impl std::error::Error for ParseError {}

/// Why a refresh cycle retained the previous data for a source.
#[derive(Debug)]
pub enum RefreshError {
    Fetch(FetchError),
    Parse(ParseError),
}

impl fmt::Display for RefreshError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefreshError::Fetch(e) => write!(f, "fetch failed: {e}"),
            RefreshError::Parse(e) => write!(f, "parse failed: {e}"),
        }
    }
}

impl std::error::Error for RefreshError {}

impl From<FetchError> for RefreshError {
    fn from(e: FetchError) -> Self {
        RefreshError::Fetch(e)
    }
}

impl From<ParseError> for RefreshError {
    fn from(e: ParseError) -> Self {
        RefreshError::Parse(e)
    }
}

/// Wholesale rejection of a batch. No rows are produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchError {
    TooManyRecords { count: usize, limit: usize },
    TooLarge { bytes: usize, limit: usize },
}

impl fmt::Display for BatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchError::TooManyRecords { count, limit } => {
                write!(f, "batch has {count} records, limit is {limit}")
            }
            BatchError::TooLarge { bytes, limit } => {
                write!(f, "batch payload is {bytes} bytes, limit is {limit}")
            }
        }
    }
}

impl std::error::Error for BatchError {}
