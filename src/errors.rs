/*!
 * Error types for the dualsub pipeline.
 *
 * Each stage of the pipeline owns a small error enum built with `thiserror`:
 * provider calls, cue merging, batch translation and durable storage. The
 * umbrella `AppError` is what the binary reports.
 */

use thiserror::Error;

/// Errors that can occur when talking to a translation backend
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Error when making an API request fails
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Error when parsing an API response fails
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Error returned by the API itself
    #[error("API responded with error: {status_code} - {message}")]
    ApiError {
        /// HTTP status code
        status_code: u16,
        /// Error message from the API
        message: String,
    },

    /// Error establishing or maintaining a connection
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Error related to rate limiting
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Error with authentication
    #[error("Authentication error: {0}")]
    AuthenticationError(String),
}

impl ProviderError {
    /// Map an HTTP status and body to the matching error variant
    pub fn from_status(status_code: u16, message: String) -> Self {
        match status_code {
            401 | 403 => Self::AuthenticationError(message),
            429 => Self::RateLimitExceeded(message),
            _ => Self::ApiError { status_code, message },
        }
    }

    /// Whether retrying the same request can reasonably succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::AuthenticationError(_) => false,
            Self::ApiError { status_code, .. } => *status_code >= 500 || *status_code == 408,
            _ => true,
        }
    }
}

/// Errors raised while turning raw captions into cues
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SubtitleError {
    /// A raw cue is missing its start or duration, or carries a bad value
    #[error("Malformed cue #{index}: {reason}")]
    MalformedCue {
        /// Position of the cue in the raw input
        index: usize,
        /// What is wrong with it
        reason: String,
    },
}

/// Errors that can occur while translating subtitle batches
#[derive(Error, Debug)]
pub enum TranslationError {
    /// Error from the provider API
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// The provider answered but with nothing usable
    #[error("Provider returned an empty response")]
    EmptyResponse,

    /// The response did not contain a usable JSON array
    #[error("Failed to parse translation response: {0}")]
    ResponseParse(String),

    /// A batch kept failing until the retry budget ran out
    #[error("Batch {batch} failed after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        /// Zero-based batch index
        batch: usize,
        /// Number of attempts made
        attempts: u32,
        /// Message of the final failure
        last_error: String,
    },

    /// `start` was called while another run is still active
    #[error("A translation run is already in progress")]
    AlreadyRunning,
}

/// Errors from the durable key/value store
#[derive(Error, Debug)]
pub enum StorageError {
    /// The backing database failed
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A stored value could not be (de)serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The blocking storage task could not complete
    #[error("Storage task failed: {0}")]
    Task(String),

    /// Filesystem problem around the database file
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Main application error type that wraps all other errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Error from a file operation
    #[error("File error: {0}")]
    File(String),

    /// Error from a provider
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Error from subtitle processing
    #[error("Subtitle error: {0}")]
    Subtitle(#[from] SubtitleError),

    /// Error from translation
    #[error("Translation error: {0}")]
    Translation(#[from] TranslationError),

    /// Error from storage
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Any other error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::Unknown(error.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::File(error.to_string())
    }
}
