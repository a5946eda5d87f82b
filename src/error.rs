use thiserror::Error;

/// Type alias for Result with GmailError
pub type Result<T> = std::result::Result<T, GmailError>;

/// Failure of a single Gmail API call.
///
/// While archiving, these are recorded against the batch that produced them
/// and the run carries on. While listing, they abort the run wrapped in
/// [`ArchiveError::Enumeration`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GmailError {
    /// Gmail API returned an error
    #[error("Gmail API error: {0}")]
    ApiError(String),

    /// Rate limit exceeded - should retry after specified seconds
    #[error("Rate limit exceeded, retry after {retry_after} seconds")]
    RateLimitExceeded { retry_after: u64 },

    /// Network-related error (connection issues, timeouts, etc.)
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Server returned 5xx error
    #[error("Server error (HTTP {status}): {message}")]
    ServerError { status: u16, message: String },

    /// Resource not found (404)
    #[error("Message not found: {0}")]
    MessageNotFound(String),

    /// Bad request (400)
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Unauthorized (401) - token expired or revoked mid-run
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Forbidden (403)
    #[error("Access forbidden: {0}")]
    Forbidden(String),
}

impl GmailError {
    /// Check if the error is transient and a later invocation may succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            GmailError::RateLimitExceeded { .. }
                | GmailError::ServerError { .. }
                | GmailError::NetworkError(_)
        )
    }

    /// Check if the error is permanent
    pub fn is_permanent(&self) -> bool {
        !self.is_transient()
    }
}

/// Fatal failure of an archive or status run.
///
/// Anything returned as `ArchiveError` ends the run. Per-batch failures are
/// never reported this way; they are folded into the round counters instead.
#[derive(Error, Debug)]
pub enum ArchiveError {
    /// Client id or secret missing before any network call
    #[error("Both a client ID and a client secret are required")]
    MissingCredentials,

    /// OAuth flow, token cache or hub construction failed
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Listing the inbox failed; partially fetched ids were discarded
    #[error("Failed to enumerate inbox messages")]
    Enumeration(#[source] GmailError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// User declined a prompt or interrupted it
    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    /// IO error (token cache directory, prompts, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ArchiveError {
    /// Whether the user should be walked through OAuth credential setup
    pub fn needs_credential_help(&self) -> bool {
        matches!(
            self,
            ArchiveError::MissingCredentials | ArchiveError::Authentication(_)
        )
    }
}

/// Parse the Retry-After header from an HTTP response
///
/// The Retry-After header can be specified in two formats:
/// 1. Delay-seconds: An integer indicating seconds to wait (e.g., "120")
/// 2. HTTP-date: An HTTP date format (e.g., "Wed, 21 Oct 2015 07:28:00 GMT")
///
/// Returns the number of seconds to wait. If the header is missing or invalid,
/// returns a default of 5 seconds.
fn parse_retry_after_header<B>(response: &hyper::Response<B>) -> u64 {
    const DEFAULT_RETRY_AFTER: u64 = 5;

    let Some(value) = response
        .headers()
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
    else {
        return DEFAULT_RETRY_AFTER;
    };

    if let Ok(seconds) = value.parse::<u64>() {
        return seconds;
    }

    httpdate::parse_http_date(value)
        .ok()
        .and_then(|at| at.duration_since(std::time::SystemTime::now()).ok())
        .map(|d| d.as_secs())
        .unwrap_or(DEFAULT_RETRY_AFTER)
}

impl From<google_gmail1::Error> for GmailError {
    fn from(error: google_gmail1::Error) -> Self {
        match error {
            google_gmail1::Error::Failure(ref response) => {
                let status = response.status();
                let status_code = status.as_u16();
                let message = format!(
                    "HTTP {}: {}",
                    status_code,
                    status.canonical_reason().unwrap_or("Unknown")
                );

                match status_code {
                    429 => GmailError::RateLimitExceeded {
                        retry_after: parse_retry_after_header(response),
                    },
                    400 => GmailError::BadRequest(message),
                    401 => GmailError::Unauthorized(message),
                    403 => GmailError::Forbidden(message),
                    404 => GmailError::MessageNotFound("Resource not found".to_string()),
                    500..=599 => GmailError::ServerError {
                        status: status_code,
                        message,
                    },
                    _ => GmailError::ApiError(message),
                }
            }
            google_gmail1::Error::BadRequest(ref err) => GmailError::BadRequest(err.to_string()),
            google_gmail1::Error::HttpError(ref err) => {
                GmailError::NetworkError(format!("Connection error: {}", err))
            }
            google_gmail1::Error::Io(err) => GmailError::NetworkError(err.to_string()),
            _ => GmailError::ApiError(error.to_string()),
        }
    }
}
