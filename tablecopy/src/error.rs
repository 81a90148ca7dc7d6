//! Error types and result definitions for table copy operations.
//!
//! Provides a classified error system with captured diagnostic metadata. The
//! [`CopyError`] type carries an [`ErrorKind`], a static description, optional
//! dynamic detail, the originating callsite and an optional source error. The
//! kind is what the batch-write retry loop consults to decide between backing
//! off and aborting the whole copy.

use std::backtrace::Backtrace;
use std::borrow::Cow;
use std::error;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

/// Convenient result type for copy operations using [`CopyError`] as the error type.
pub type CopyResult<T> = Result<T, CopyError>;

/// Specific categories of errors that can occur while copying a table.
///
/// The split that matters operationally is [`ErrorKind::is_retryable`]:
/// transient service-side conditions are retried by the write loop, everything
/// else aborts the pipeline on first occurrence.
#[derive(PartialEq, Eq, Copy, Clone, Debug, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    // Configuration errors
    ConfigError,

    // Source read path
    SourceScanFailed,
    SourceTableMissing,

    // Destination write path
    DestinationWriteFailed,
    DestinationTableMissing,

    // Transient service conditions
    Throttled,
    ServiceUnavailable,

    // Security & authentication
    AuthenticationError,
    PermissionDenied,

    // Data validation at the service boundary
    ConversionError,
    ValidationError,

    // IO & serialization
    IoError,
    SerializationError,

    // Unknown / uncategorized
    Unknown,
}

impl ErrorKind {
    /// Returns whether an error of this kind is a transient service condition
    /// that the write-retry loop may retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::Throttled | ErrorKind::ServiceUnavailable)
    }
}

/// Detailed payload stored inside a [`CopyError`].
#[derive(Debug, Clone)]
struct ErrorPayload {
    kind: ErrorKind,
    description: Cow<'static, str>,
    detail: Option<Cow<'static, str>>,
    source: Option<Arc<dyn error::Error + Send + Sync>>,
    location: &'static Location<'static>,
    backtrace: Arc<Backtrace>,
}

/// Main error type for table copy operations.
#[derive(Debug, Clone)]
pub struct CopyError {
    payload: ErrorPayload,
}

impl CopyError {
    /// Returns the [`ErrorKind`] of this error.
    pub fn kind(&self) -> ErrorKind {
        self.payload.kind
    }

    /// Returns whether the write-retry loop may retry after this error.
    ///
    /// The classification is trusted verbatim from whichever client produced
    /// the error.
    pub fn is_retryable(&self) -> bool {
        self.payload.kind.is_retryable()
    }

    /// Returns the detailed error information if available.
    pub fn detail(&self) -> Option<&str> {
        self.payload.detail.as_deref()
    }

    /// Returns the captured callsite location for this error.
    pub fn location(&self) -> &'static Location<'static> {
        self.payload.location
    }

    /// Returns the captured backtrace for this error.
    pub fn backtrace(&self) -> &Backtrace {
        self.payload.backtrace.as_ref()
    }

    /// Attaches an originating [`error::Error`] to this error and returns the
    /// modified instance. The stored source is preserved across clones and
    /// exposed via [`error::Error::source`].
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: error::Error + Send + Sync + 'static,
    {
        self.payload.source = Some(Arc::new(source));
        self
    }

    /// Creates a [`CopyError`] from its components.
    #[track_caller]
    fn from_components(
        kind: ErrorKind,
        description: Cow<'static, str>,
        detail: Option<Cow<'static, str>>,
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    ) -> Self {
        CopyError {
            payload: ErrorPayload {
                kind,
                description,
                detail,
                source,
                location: Location::caller(),
                backtrace: Arc::new(Backtrace::capture()),
            },
        }
    }
}

impl fmt::Display for CopyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        let location = self.payload.location;
        write!(
            f,
            "[{:?}] {} @ {}:{}:{}",
            self.payload.kind,
            self.payload.description,
            location.file(),
            location.line(),
            location.column()
        )?;

        if let Some(detail) = self.payload.detail.as_deref() {
            write!(f, "\n  Detail: {detail}")?;
        }

        Ok(())
    }
}

impl error::Error for CopyError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        self.payload
            .source
            .as_ref()
            .map(|source| source as &(dyn error::Error + 'static))
    }
}

/// Errors compare equal when they carry the same kind, which is the only
/// stable identifying component.
impl PartialEq for CopyError {
    fn eq(&self, other: &CopyError) -> bool {
        self.payload.kind == other.payload.kind
    }
}

/// Creates a [`CopyError`] from an error kind and static description.
impl From<(ErrorKind, &'static str)> for CopyError {
    #[track_caller]
    fn from((kind, desc): (ErrorKind, &'static str)) -> CopyError {
        CopyError::from_components(kind, Cow::Borrowed(desc), None, None)
    }
}

/// Creates a [`CopyError`] from an error kind, static description, and dynamic detail.
impl<D> From<(ErrorKind, &'static str, D)> for CopyError
where
    D: Into<Cow<'static, str>>,
{
    #[track_caller]
    fn from((kind, desc, detail): (ErrorKind, &'static str, D)) -> CopyError {
        CopyError::from_components(kind, Cow::Borrowed(desc), Some(detail.into()), None)
    }
}

/// Converts [`std::io::Error`] to [`CopyError`] with [`ErrorKind::IoError`].
impl From<std::io::Error> for CopyError {
    #[track_caller]
    fn from(err: std::io::Error) -> CopyError {
        let detail = err.to_string();
        let source = Arc::new(err);
        CopyError::from_components(
            ErrorKind::IoError,
            Cow::Borrowed("I/O operation failed"),
            Some(Cow::Owned(detail)),
            Some(source),
        )
    }
}

/// Converts [`serde_json::Error`] to [`CopyError`] with [`ErrorKind::SerializationError`].
impl From<serde_json::Error> for CopyError {
    #[track_caller]
    fn from(err: serde_json::Error) -> CopyError {
        let detail = err.to_string();
        let source = Arc::new(err);
        CopyError::from_components(
            ErrorKind::SerializationError,
            Cow::Borrowed("JSON serialization failed"),
            Some(Cow::Owned(detail)),
            Some(source),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_kinds_are_exactly_the_transient_ones() {
        assert!(ErrorKind::Throttled.is_retryable());
        assert!(ErrorKind::ServiceUnavailable.is_retryable());

        assert!(!ErrorKind::ConfigError.is_retryable());
        assert!(!ErrorKind::SourceScanFailed.is_retryable());
        assert!(!ErrorKind::DestinationWriteFailed.is_retryable());
        assert!(!ErrorKind::AuthenticationError.is_retryable());
        assert!(!ErrorKind::PermissionDenied.is_retryable());
        assert!(!ErrorKind::ValidationError.is_retryable());
        assert!(!ErrorKind::Unknown.is_retryable());
    }

    #[test]
    fn display_includes_kind_description_and_detail() {
        let err = CopyError::from((
            ErrorKind::DestinationWriteFailed,
            "Batch write rejected",
            "table does not exist",
        ));

        let rendered = err.to_string();
        assert!(rendered.contains("DestinationWriteFailed"));
        assert!(rendered.contains("Batch write rejected"));
        assert!(rendered.contains("table does not exist"));
    }

    #[test]
    fn source_is_exposed_through_error_chain() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        let err = CopyError::from((ErrorKind::ServiceUnavailable, "Service call failed"))
            .with_source(io);

        assert!(std::error::Error::source(&err).is_some());
        assert!(err.is_retryable());
    }
}
