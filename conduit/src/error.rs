//! Error types and result definitions for conduit operations.
//!
//! Provides an error type with classification, aggregation, and captured diagnostic metadata.
//! The [`ConduitError`] type supports single errors, errors with additional detail, and multiple
//! aggregated errors, which is how failures from several pool workers are reported at once.
//!
//! Absence is not an error in this crate: cache lookups return [`Option`]. Failures of a
//! caller-supplied job processor travel inside the job result and never surface here.

use std::backtrace::Backtrace;
use std::borrow::Cow;
use std::error;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

/// Convenient result type for conduit operations using [`ConduitError`] as the error type.
pub type ConduitResult<T> = Result<T, ConduitError>;

/// Detailed payload stored for single [`ConduitError`] instances.
#[derive(Debug, Clone)]
struct ErrorPayload {
    kind: ErrorKind,
    description: Cow<'static, str>,
    detail: Option<Cow<'static, str>>,
    source: Option<Arc<dyn error::Error + Send + Sync>>,
    location: &'static Location<'static>,
    backtrace: Arc<Backtrace>,
}

/// Main error type for conduit operations.
///
/// [`ConduitError`] can represent a single error, an error with additional detail, or
/// multiple aggregated errors.
#[derive(Debug, Clone)]
pub struct ConduitError {
    repr: ErrorRepr,
}

/// Internal representation of error data.
#[derive(Debug, Clone)]
enum ErrorRepr {
    /// Single error payload holding rich metadata.
    Single(ErrorPayload),
    /// Multiple aggregated errors.
    ///
    /// This variant is mainly useful to capture failures of multiple workers.
    Many {
        errors: Vec<ConduitError>,
        location: &'static Location<'static>,
    },
}

/// Categories of errors that can occur while coordinating concurrent work.
#[derive(PartialEq, Eq, Copy, Clone, Debug, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    // Interruption Errors
    /// A blocking wait was interrupted by a fired cancellation signal.
    Cancelled,
    /// A bounded wait ran out of time.
    TimedOut,

    // Lifecycle Errors
    /// Work was submitted to a pool that is stopping or stopped.
    PoolStopped,
    /// An operation was invoked in a lifecycle state that does not allow it.
    InvalidState,
    /// A worker task panicked while processing.
    WorkerPanic,

    // Configuration Errors
    ConfigError,

    // Unknown / Uncategorized
    Unknown,
}

impl ConduitError {
    /// Returns the [`ErrorKind`] of this error.
    ///
    /// For multiple errors, returns the kind of the first error or [`ErrorKind::Unknown`]
    /// if the error list is empty.
    pub fn kind(&self) -> ErrorKind {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.kind,
            ErrorRepr::Many { ref errors, .. } => errors
                .first()
                .map(|err| err.kind())
                .unwrap_or(ErrorKind::Unknown),
        }
    }

    /// Returns all [`ErrorKind`]s present in this error.
    pub fn kinds(&self) -> Vec<ErrorKind> {
        match self.repr {
            ErrorRepr::Single(ref payload) => vec![payload.kind],
            ErrorRepr::Many { ref errors, .. } => errors
                .iter()
                .flat_map(|err| err.kinds())
                .collect::<Vec<_>>(),
        }
    }

    /// Returns `true` if this error was caused by a fired cancellation signal.
    pub fn is_cancelled(&self) -> bool {
        self.kind() == ErrorKind::Cancelled
    }

    /// Returns the static description of this error.
    ///
    /// Aggregated errors return the description of their first inner error.
    pub fn description(&self) -> &str {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.description.as_ref(),
            ErrorRepr::Many { ref errors, .. } => errors
                .first()
                .map(|err| err.description())
                .unwrap_or("no inner errors"),
        }
    }

    /// Returns the detailed error information if available.
    ///
    /// For multiple errors, returns the detail of the first error that has one.
    pub fn detail(&self) -> Option<&str> {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.detail.as_deref(),
            ErrorRepr::Many { ref errors, .. } => errors.iter().find_map(|e| e.detail()),
        }
    }

    /// Returns the captured callsite location for this error.
    pub fn location(&self) -> &'static Location<'static> {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.location,
            ErrorRepr::Many { location, .. } => location,
        }
    }

    /// Attaches an originating [`error::Error`] to this error and returns the modified instance.
    ///
    /// Has no effect when called on aggregated errors because aggregates forward the first
    /// contained error as their source.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: error::Error + Send + Sync + 'static,
    {
        if let ErrorRepr::Single(ref mut payload) = self.repr {
            payload.source = Some(Arc::new(source));
        }
        self
    }

    /// Creates a [`ConduitError`] from its components.
    #[track_caller]
    fn from_components(
        kind: ErrorKind,
        description: Cow<'static, str>,
        detail: Option<Cow<'static, str>>,
    ) -> Self {
        ConduitError {
            repr: ErrorRepr::Single(ErrorPayload {
                kind,
                description,
                detail,
                source: None,
                location: Location::caller(),
                backtrace: Arc::new(Backtrace::capture()),
            }),
        }
    }
}

impl PartialEq for ConduitError {
    fn eq(&self, other: &ConduitError) -> bool {
        match (&self.repr, &other.repr) {
            (ErrorRepr::Single(a), ErrorRepr::Single(b)) => a.kind == b.kind,
            (
                ErrorRepr::Many {
                    errors: errors_a, ..
                },
                ErrorRepr::Many {
                    errors: errors_b, ..
                },
            ) => {
                errors_a.len() == errors_b.len()
                    && errors_a.iter().zip(errors_b.iter()).all(|(a, b)| a == b)
            }
            _ => false,
        }
    }
}

impl fmt::Display for ConduitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        match &self.repr {
            ErrorRepr::Single(payload) => {
                let location = payload.location;
                write!(
                    f,
                    "[{:?}] {} @ {}:{}:{}",
                    payload.kind,
                    payload.description,
                    location.file(),
                    location.line(),
                    location.column()
                )?;

                write_detail(payload.detail.as_deref(), f, 1)?;
                write_backtrace(payload.backtrace.as_ref(), f, 1)?;

                Ok(())
            }
            ErrorRepr::Many { errors, location } => {
                let count = errors.len();
                write!(
                    f,
                    "[Many] {} error{} aggregated @ {}:{}:{}",
                    count,
                    if count == 1 { "" } else { "s" },
                    location.file(),
                    location.line(),
                    location.column()
                )?;

                if errors.is_empty() {
                    write!(f, "\n  (no inner errors provided)")?;
                }

                for (index, error) in errors.iter().enumerate() {
                    let rendered = format!("{error}");
                    let mut lines = rendered.lines();
                    match lines.next() {
                        Some(first_line) => write!(f, "\n  {}. {}", index + 1, first_line)?,
                        None => write!(f, "\n  {}.", index + 1)?,
                    }

                    for line in lines {
                        write!(f, "\n     {line}")?;
                    }
                }

                Ok(())
            }
        }
    }
}

impl error::Error for ConduitError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match &self.repr {
            ErrorRepr::Single(payload) => payload
                .source
                .as_ref()
                .map(|source| source as &(dyn error::Error + 'static)),
            ErrorRepr::Many { errors, .. } => errors
                .first()
                .map(|error| error as &(dyn error::Error + 'static)),
        }
    }
}

/// Writes the captured backtrace with indentation.
fn write_backtrace(
    backtrace: &Backtrace,
    f: &mut fmt::Formatter<'_>,
    indent: usize,
) -> fmt::Result {
    let indent_str = "  ".repeat(indent);

    let rendered_backtrace = format!("{backtrace}");
    if !rendered_backtrace.trim().is_empty() {
        write!(f, "\n{indent_str}Backtrace:")?;
        for line in rendered_backtrace.lines() {
            write!(f, "\n{indent_str}  {line}")?;
        }
    }

    Ok(())
}

/// Writes the detail block with indentation.
fn write_detail(detail: Option<&str>, f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
    let Some(detail) = detail else {
        return Ok(());
    };

    let indent_str = "  ".repeat(indent);
    if detail.trim().is_empty() {
        return write!(f, "\n{indent_str}Detail: <empty>");
    }

    write!(f, "\n{indent_str}Detail:")?;
    for line in detail.lines() {
        write!(f, "\n{indent_str}  {line}")?;
    }

    Ok(())
}

/// Creates a [`ConduitError`] from an error kind and static description.
impl From<(ErrorKind, &'static str)> for ConduitError {
    #[track_caller]
    fn from((kind, desc): (ErrorKind, &'static str)) -> ConduitError {
        ConduitError::from_components(kind, Cow::Borrowed(desc), None)
    }
}

/// Creates a [`ConduitError`] from an error kind, static description, and dynamic detail.
impl<D> From<(ErrorKind, &'static str, D)> for ConduitError
where
    D: Into<Cow<'static, str>>,
{
    #[track_caller]
    fn from((kind, desc, detail): (ErrorKind, &'static str, D)) -> ConduitError {
        ConduitError::from_components(kind, Cow::Borrowed(desc), Some(detail.into()))
    }
}

/// Creates a [`ConduitError`] from a vector of errors for aggregation.
///
/// If the vector contains exactly one error, returns that error directly without wrapping
/// it in the [`ErrorRepr::Many`] variant.
impl<E> From<Vec<E>> for ConduitError
where
    E: Into<ConduitError>,
{
    #[track_caller]
    fn from(errors: Vec<E>) -> ConduitError {
        let location = Location::caller();

        let mut errors: Vec<ConduitError> = errors.into_iter().map(Into::into).collect();
        if errors.len() == 1
            && let Some(error) = errors.pop()
        {
            return error;
        }

        ConduitError {
            repr: ErrorRepr::Many { errors, location },
        }
    }
}

/// Converts a configuration [`conduit_config::shared::ValidationError`] into
/// [`ErrorKind::ConfigError`].
impl From<conduit_config::shared::ValidationError> for ConduitError {
    #[track_caller]
    fn from(err: conduit_config::shared::ValidationError) -> ConduitError {
        let detail = err.to_string();
        ConduitError::from_components(
            ErrorKind::ConfigError,
            Cow::Borrowed("Invalid configuration"),
            Some(Cow::Owned(detail)),
        )
        .with_source(err)
    }
}
