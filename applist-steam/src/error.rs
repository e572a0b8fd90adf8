/// Errors raised inside the catalog pipeline.
///
/// Public pipeline operations do not return these; they log them and
/// degrade to empty or partial results. They surface from the lower-level
/// traits ([`crate::CatalogSource`], [`crate::ProductInfoTransport`],
/// [`crate::ImageFetcher`]) so retry logic can tell the cases apart.
#[derive(Debug, thiserror::Error)]
pub enum SteamError {
    #[error("HTTP request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Server returned HTTP {status} for {url}")]
    Status { status: u16, url: String },

    #[error("Timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Malformed response: {0}")]
    Parse(String),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("No data for {0}")]
    NotFound(String),

    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Coarse classification of a [`SteamError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Timeout, refused connection, non-success status.
    NetworkFailure,
    /// The response arrived but could not be understood.
    ParseFailure,
    /// Valid response with no data for the requested id.
    NotFound,
    /// The product-info session dropped; the client reconnects.
    ConnectionLost,
    /// Local disk or configuration problem.
    Local,
}

impl SteamError {
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn connection_lost(msg: impl Into<String>) -> Self {
        Self::ConnectionLost(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Network(e) if e.is_decode() => ErrorKind::ParseFailure,
            Self::Network(_) | Self::Status { .. } | Self::Timeout(_) => ErrorKind::NetworkFailure,
            Self::Parse(_) | Self::Json(_) => ErrorKind::ParseFailure,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::ConnectionLost(_) => ErrorKind::ConnectionLost,
            Self::Io(_) | Self::Config(_) => ErrorKind::Local,
        }
    }

    pub fn is_connection_lost(&self) -> bool {
        self.kind() == ErrorKind::ConnectionLost
    }
}
