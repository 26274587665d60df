//! Error handling for deezload.
//!
//! Provides a unified error type that pairs a download-oriented category
//! ([`ErrorKind`]) with the underlying error details.
//!
//! # Error Categories
//!
//! * Lookup misses: [`NotFound`](ErrorKind::NotFound) for catalog and media
//!   lookups, [`TrackNotFound`](ErrorKind::TrackNotFound) for a track that
//!   could not be acquired at all
//! * Licensing: [`RightsDenied`](ErrorKind::RightsDenied),
//!   [`MarketUnavailable`](ErrorKind::MarketUnavailable)
//! * Quality: [`QualityUnavailable`](ErrorKind::QualityUnavailable)
//! * Processing: [`DecryptionFailed`](ErrorKind::DecryptionFailed),
//!   [`ConversionFailed`](ErrorKind::ConversionFailed)
//! * Transport: [`NetworkFailure`](ErrorKind::NetworkFailure)
//!
//! Errors can wrap other errors with [`Error::wrap`], which keeps the cause
//! reachable through [`std::error::Error::source`]. Use [`Error::is`] to ask
//! whether any error in the chain has a given kind.
//!
//! # Example
//!
//! ```rust
//! use deezload::error::{Error, ErrorKind, Result};
//!
//! fn lookup(found: bool) -> Result<()> {
//!     if !found {
//!         return Err(Error::not_found("track does not exist"));
//!     }
//!     Ok(())
//! }
//! ```

#![allow(clippy::enum_glob_use)]

use std::fmt;
use thiserror::Error;

/// Main error type combining error kind and details.
#[derive(Debug)]
pub struct Error {
    /// Classification of the error
    pub kind: ErrorKind,

    /// Details of the underlying error
    pub error: Box<dyn std::error::Error + Send + Sync>,
}

/// Standard result type for deezload operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories for the acquisition pipeline.
///
/// The `Display` text of each variant is the user-facing description of
/// the category.
#[expect(clippy::module_name_repetitions)]
#[derive(Clone, Copy, Debug, Eq, Error, Hash, Ord, PartialEq, PartialOrd)]
pub enum ErrorKind {
    /// Catalog or media lookup miss
    #[error("not found")]
    NotFound,

    /// The track could not be acquired at any usable quality
    #[error("track not found")]
    TrackNotFound,

    /// No license for the requested media
    #[error("no rights on media")]
    RightsDenied,

    /// Requested tier absent and fallback disabled or exhausted
    #[error("quality not available")]
    QualityUnavailable,

    /// Decrypting or writing the stream failed
    #[error("decryption failed")]
    DecryptionFailed,

    /// Transcoding failed (non-fatal for an acquisition)
    #[error("conversion failed")]
    ConversionFailed,

    /// Connection, timeout or unexpected HTTP status
    #[error("network failure")]
    NetworkFailure,

    /// Content not available in the configured market
    #[error("not available in market")]
    MarketUnavailable,

    /// Malformed input or response
    #[error("invalid argument")]
    InvalidArgument,

    /// Unexpected internal failure
    #[error("internal error")]
    Internal,

    /// Anything that could not be categorized
    #[error("unknown error")]
    Unknown,
}

/// Context message wrapped around a causing error.
#[derive(Debug)]
struct Context {
    message: String,
    cause: Error,
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for Context {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.cause)
    }
}

macro_rules! constructor {
    ($(#[$meta:meta])* $name:ident, $kind:ident) => {
        $(#[$meta])*
        pub fn $name<E>(error: E) -> Self
        where
            E: Into<Box<dyn std::error::Error + Send + Sync>>,
        {
            Self::new(ErrorKind::$kind, error)
        }
    };
}

impl Error {
    /// Creates a new error with specified kind and details.
    ///
    /// # Examples
    ///
    /// ```rust
    /// let err = Error::new(ErrorKind::NotFound, "album not found");
    /// assert_eq!(err.kind, ErrorKind::NotFound);
    /// ```
    pub fn new<E>(kind: ErrorKind, error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self {
            kind,
            error: error.into(),
        }
    }

    /// Wraps `cause` in a new error of `kind` with a context message.
    ///
    /// The cause stays reachable through [`source`](std::error::Error::source)
    /// and is considered by [`Error::is`] and [`Error::root_message`].
    pub fn wrap(kind: ErrorKind, message: impl Into<String>, cause: Error) -> Self {
        Self {
            kind,
            error: Box::new(Context {
                message: message.into(),
                cause,
            }),
        }
    }

    constructor!(
        /// Creates an error for catalog or media lookup misses.
        not_found,
        NotFound
    );
    constructor!(
        /// Creates an error for a track that could not be acquired.
        track_not_found,
        TrackNotFound
    );
    constructor!(
        /// Creates an error for media the account has no license for.
        rights_denied,
        RightsDenied
    );
    constructor!(
        /// Creates an error for a quality tier that cannot be served.
        quality_unavailable,
        QualityUnavailable
    );
    constructor!(
        /// Creates an error for a failed decryption or write.
        decryption_failed,
        DecryptionFailed
    );
    constructor!(
        /// Creates an error for a failed transcode.
        conversion_failed,
        ConversionFailed
    );
    constructor!(
        /// Creates an error for transport failures.
        network_failure,
        NetworkFailure
    );
    constructor!(
        /// Creates an error for geographically restricted content.
        market_unavailable,
        MarketUnavailable
    );
    constructor!(
        /// Creates an error for invalid input.
        invalid_argument,
        InvalidArgument
    );
    constructor!(
        /// Creates an error for unexpected internal failures.
        internal,
        Internal
    );
    constructor!(
        /// Creates an error that could not be categorized.
        unknown,
        Unknown
    );

    /// Attempts to downcast the underlying error to a concrete type.
    #[must_use]
    pub fn downcast<E>(&self) -> Option<&E>
    where
        E: std::error::Error + 'static,
    {
        self.error.downcast_ref::<E>()
    }

    /// Returns `true` if this error or any error it wraps has `kind`.
    #[must_use]
    pub fn is(&self, kind: ErrorKind) -> bool {
        self.chain().any(|error| error.kind == kind)
    }

    /// Message of the innermost wrapped error, without kind prefixes.
    #[must_use]
    pub fn root_message(&self) -> String {
        self.chain()
            .last()
            .map_or_else(String::new, |error| error.error.to_string())
    }

    /// Iterates over this error and every [`Error`] it wraps.
    fn chain(&self) -> impl Iterator<Item = &Error> {
        std::iter::successors(Some(self), |error| {
            error
                .downcast::<Context>()
                .map(|context| &context.cause)
        })
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self.downcast::<Context>() {
            Some(context) => Some(&context.cause),
            None => self.error.source(),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "{}: ", self.kind)?;
        self.error.fmt(fmt)?;
        if let Some(context) = self.downcast::<Context>() {
            write!(fmt, " ({})", context.cause)?;
        }
        Ok(())
    }
}

/// Rewrites a failure message into a user-facing cause.
///
/// Known substrings are checked in order; anything else is returned as is.
///
/// # Examples
///
/// ```rust
/// use deezload::error::classify;
///
/// assert_eq!(classify("HTTP 404 Not Found"), "Track not found (HTTP 404)");
/// ```
#[must_use]
pub fn classify(message: &str) -> String {
    let lower = message.to_lowercase();
    let cause = if lower.contains("padding") {
        "Decryption error (padding issue) - try a different quality setting or download format"
    } else if lower.contains("connection") {
        "Connection error - check your internet connection"
    } else if lower.contains("timeout") || lower.contains("timed out") {
        "Request timed out - the server took too long to respond"
    } else if message.contains("403") || lower.contains("forbidden") {
        "Access forbidden - track might be region-restricted or require a premium account"
    } else if message.contains("404") || lower.contains("not found") {
        "Track not found (HTTP 404)"
    } else {
        return message.to_owned();
    };
    cause.to_owned()
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind::*;
        match err.kind() {
            NotFound => Self::not_found(err),
            ConnectionRefused | ConnectionReset | ConnectionAborted | NotConnected
            | AddrNotAvailable | BrokenPipe | TimedOut => Self::network_failure(err),
            InvalidInput | InvalidData | UnexpectedEof => Self::invalid_argument(err),
            _ => Self::internal(err),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return match status {
                reqwest::StatusCode::NOT_FOUND => Self::not_found(err),
                reqwest::StatusCode::FORBIDDEN | reqwest::StatusCode::UNAUTHORIZED => {
                    Self::rights_denied(err)
                }
                _ => Self::network_failure(err),
            };
        }

        if err.is_decode() {
            return Self::invalid_argument(err);
        }

        if err.is_builder() {
            return Self::internal(err);
        }

        Self::network_failure(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::invalid_argument(err)
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Self::invalid_argument(err)
    }
}

impl From<url::ParseError> for Error {
    fn from(e: url::ParseError) -> Self {
        Self::invalid_argument(e.to_string())
    }
}

impl From<http::header::InvalidHeaderValue> for Error {
    fn from(e: http::header::InvalidHeaderValue) -> Self {
        Self::internal(e.to_string())
    }
}

impl From<http::header::MaxSizeReached> for Error {
    fn from(e: http::header::MaxSizeReached) -> Self {
        Self::internal(e.to_string())
    }
}

impl From<base64::DecodeError> for Error {
    fn from(e: base64::DecodeError) -> Self {
        Self::invalid_argument(e.to_string())
    }
}

impl From<hex::FromHexError> for Error {
    fn from(e: hex::FromHexError) -> Self {
        Self::invalid_argument(e.to_string())
    }
}

impl From<zip::result::ZipError> for Error {
    fn from(e: zip::result::ZipError) -> Self {
        Self::internal(e)
    }
}

impl From<lofty::error::LoftyError> for Error {
    fn from(e: lofty::error::LoftyError) -> Self {
        Self::internal(e)
    }
}

impl From<std::fmt::Error> for Error {
    fn from(e: std::fmt::Error) -> Self {
        Self::unknown(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrapped_kinds_are_visible_through_the_chain() {
        let cause = Error::decryption_failed("bad block");
        let error = Error::wrap(ErrorKind::TrackNotFound, "failed to process track", cause);

        assert_eq!(error.kind, ErrorKind::TrackNotFound);
        assert!(error.is(ErrorKind::DecryptionFailed));
        assert!(!error.is(ErrorKind::NetworkFailure));
        assert_eq!(error.root_message(), "bad block");
        assert!(std::error::Error::source(&error).is_some());
    }

    #[test]
    fn display_includes_cause() {
        let error = Error::wrap(
            ErrorKind::TrackNotFound,
            "no source",
            Error::not_found("HTTP 404"),
        );
        assert_eq!(
            error.to_string(),
            "track not found: no source (not found: HTTP 404)"
        );
    }

    #[test]
    fn classify_known_substrings() {
        assert!(classify("Data must be padded to 16 byte boundary").contains("padding"));
        assert!(classify("Connection reset by peer").starts_with("Connection error"));
        assert!(classify("operation timeout").starts_with("Request timed out"));
        assert!(classify("HTTP status 403").starts_with("Access forbidden"));
        assert_eq!(classify("status 404"), "Track not found (HTTP 404)");
        assert_eq!(classify("something else"), "something else");
    }

    #[test]
    fn io_errors_map_to_kinds() {
        let err = Error::from(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        assert_eq!(err.kind, ErrorKind::NotFound);
        let err = Error::from(std::io::Error::new(std::io::ErrorKind::TimedOut, "slow"));
        assert_eq!(err.kind, ErrorKind::NetworkFailure);
    }
}
