//! Error types for archive session operations.
//!
//! This module provides the [`Error`] enum which represents every failure a
//! session, an entry handle, or a decoder binding can report, together with
//! the [`Result<T>`] alias and the [`UsageError`] sub-enum for sequencing
//! mistakes.
//!
//! # Error Classes
//!
//! Errors fall into a small number of classes, exposed through
//! [`Error::category`]:
//!
//! | Category | Variants | Typical Cause |
//! |----------|----------|---------------|
//! | Open | [`NotFound`][Error::NotFound], [`UnsupportedFormat`][Error::UnsupportedFormat], [`Open`][Error::Open] | Missing or unrecognized container |
//! | Decode | [`Corrupt`][Error::Corrupt], [`Truncated`][Error::Truncated], [`UnsupportedFeature`][Error::UnsupportedFeature] | Damaged data |
//! | Usage | [`Usage`][Error::Usage] | Caller broke the sequencing rules |
//! | Cancelled | [`Cancelled`][Error::Cancelled] | Session closed mid-operation |
//! | Limit | [`ResourceLimitExceeded`][Error::ResourceLimitExceeded] | Configured limits |
//!
//! ```rust,no_run
//! use unarchive::{ArchiveSession, Error, ErrorCategory};
//!
//! # async fn demo() -> unarchive::Result<()> {
//! match ArchiveSession::open_path("bundle.tar.gz").await {
//!     Ok(_session) => {}
//!     Err(e) if e.category() == ErrorCategory::Open => {
//!         eprintln!("cannot open archive: {}", e);
//!     }
//!     Err(e) => return Err(e),
//! }
//! # Ok(())
//! # }
//! ```

use std::io;
use std::path::PathBuf;

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorCategory {
    /// The container could not be opened; no entry can be enumerated.
    Open,
    /// Corrupt or truncated data while advancing or reading.
    Decode,
    /// The caller violated the session's sequencing rules.
    Usage,
    /// The operation was interrupted by closing the session.
    Cancelled,
    /// A configured resource limit was exceeded.
    Limit,
    /// The session configuration is invalid.
    Config,
    /// An I/O failure not attributable to the other classes.
    Io,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Open => "open",
            Self::Decode => "decode",
            Self::Usage => "usage",
            Self::Cancelled => "cancelled",
            Self::Limit => "limit",
            Self::Config => "config",
            Self::Io => "io",
        };
        f.write_str(name)
    }
}

/// A violation of the session's sequencing rules.
///
/// Usage errors indicate a bug in the caller, not a problem with the archive.
/// They are always reported before any I/O is attempted and never change the
/// session's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum UsageError {
    /// `open` was called on a session that was already opened.
    #[error("session was already opened")]
    AlreadyOpened,

    /// An operation that needs an open container was called before `open`.
    #[error("session has not been opened")]
    NotOpened,

    /// Another operation on the same session has not completed yet.
    #[error("another operation is still in flight on this session")]
    OperationInFlight,

    /// `advance` was called while the current entry still has unread payload.
    #[error("current entry has not been consumed")]
    EntryNotConsumed,

    /// The entry handle belongs to an entry the session already moved past.
    #[error("entry handle is stale")]
    StaleEntry,

    /// The entry already signaled end of payload.
    #[error("entry payload was already consumed")]
    EntryConsumed,

    /// `advance` was called after the archive-complete signal.
    #[error("archive is exhausted")]
    Exhausted,

    /// The session was closed.
    #[error("session is closed")]
    SessionClosed,

    /// A read was issued with a zero-length buffer.
    #[error("read buffer must not be empty")]
    EmptyBuffer,
}

/// The main error type for archive session operations.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The container path does not exist.
    #[error("archive not found: {}", path.display())]
    NotFound {
        /// The path that was opened.
        path: PathBuf,
    },

    /// The container exists but is not in a recognized format.
    ///
    /// Returned when the compression magic is unknown or disabled at build
    /// time, or when the first decoded block is not a valid tar header.
    #[error("unsupported archive format in {}: {reason}", path.display())]
    UnsupportedFormat {
        /// The path that was opened.
        path: PathBuf,
        /// What was expected vs. found.
        reason: String,
    },

    /// The container could not be read while opening it.
    #[error("failed to open {}: {source}", path.display())]
    Open {
        /// The path that was opened.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// An I/O error not tied to opening or decoding.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Corrupt data was found while advancing or reading.
    #[error("corrupt archive data{}: {reason}", EntryContext { index: *entry_index, name: entry_name.as_deref() })]
    Corrupt {
        /// The entry being decoded, if any.
        entry_index: Option<usize>,
        /// The entry's path, if known.
        entry_name: Option<String>,
        /// A description of the corruption.
        reason: String,
    },

    /// An entry's payload ended before its declared size.
    #[error("truncated entry{}: expected {expected} bytes, got {actual}", EntryContext { index: Some(*entry_index), name: entry_name.as_deref() })]
    Truncated {
        /// The entry being read.
        entry_index: usize,
        /// The entry's path, if known.
        entry_name: Option<String>,
        /// The declared payload size.
        expected: u64,
        /// The bytes actually available.
        actual: u64,
    },

    /// The container uses a feature this decoder does not handle.
    #[error("unsupported feature: {feature}")]
    UnsupportedFeature {
        /// The name of the unsupported feature.
        feature: &'static str,
    },

    /// The caller violated the session's sequencing rules.
    #[error("usage error: {0}")]
    Usage(#[from] UsageError),

    /// The operation was cancelled because the session was closed.
    #[error("operation cancelled")]
    Cancelled,

    /// A configured limit was exceeded.
    #[error("resource limit exceeded: {0}")]
    ResourceLimitExceeded(String),

    /// The session configuration is invalid.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The session failed earlier; the first failure is re-reported.
    ///
    /// A session in the `Failed` state answers every operation with this
    /// error without touching the decoder.
    #[error("session failed earlier ({category}): {message}")]
    SessionFailed {
        /// The category of the first failure.
        category: ErrorCategory,
        /// The original failure's message.
        message: String,
    },
}

/// Helper for formatting optional entry context in messages.
struct EntryContext<'a> {
    index: Option<usize>,
    name: Option<&'a str>,
}

impl std::fmt::Display for EntryContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.index, self.name) {
            (Some(idx), Some(name)) => write!(f, " in entry {} ({})", idx, name),
            (Some(idx), None) => write!(f, " in entry {}", idx),
            (None, Some(name)) => write!(f, " in entry '{}'", name),
            (None, None) => Ok(()),
        }
    }
}

impl Error {
    /// Returns the coarse class of this error.
    ///
    /// For [`Error::SessionFailed`] this is the category of the first
    /// failure, so a re-reported decode error still classifies as decode.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::NotFound { .. } | Error::UnsupportedFormat { .. } | Error::Open { .. } => {
                ErrorCategory::Open
            }
            Error::Corrupt { .. } | Error::Truncated { .. } | Error::UnsupportedFeature { .. } => {
                ErrorCategory::Decode
            }
            Error::Usage(_) => ErrorCategory::Usage,
            Error::Cancelled => ErrorCategory::Cancelled,
            Error::ResourceLimitExceeded(_) => ErrorCategory::Limit,
            Error::InvalidConfig(_) => ErrorCategory::Config,
            Error::Io(_) => ErrorCategory::Io,
            Error::SessionFailed { category, .. } => *category,
        }
    }

    /// Returns `true` if the container could not be opened.
    pub fn is_open_error(&self) -> bool {
        self.category() == ErrorCategory::Open
    }

    /// Returns `true` if this is a corrupt or truncated data error.
    pub fn is_decode_error(&self) -> bool {
        self.category() == ErrorCategory::Decode
    }

    /// Returns `true` if the caller broke a sequencing rule.
    pub fn is_usage_error(&self) -> bool {
        matches!(self, Error::Usage(_))
    }

    /// Returns `true` if the operation was cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.category() == ErrorCategory::Cancelled
    }

    /// Returns the usage error, if this is one.
    pub fn usage(&self) -> Option<UsageError> {
        match self {
            Error::Usage(u) => Some(*u),
            _ => None,
        }
    }

    /// Returns the entry index associated with this error, if any.
    pub fn entry_index(&self) -> Option<usize> {
        match self {
            Error::Corrupt { entry_index, .. } => *entry_index,
            Error::Truncated { entry_index, .. } => Some(*entry_index),
            _ => None,
        }
    }

    /// Builds the error a failed session answers with from now on.
    pub(crate) fn to_session_failed(&self) -> Error {
        match self {
            Error::SessionFailed { category, message } => Error::SessionFailed {
                category: *category,
                message: message.clone(),
            },
            other => Error::SessionFailed {
                category: other.category(),
                message: other.to_string(),
            },
        }
    }
}

/// A specialized Result type for archive session operations.
pub type Result<T> = std::result::Result<T, Error>;
