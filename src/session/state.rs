//! Session lifecycle states.

use crate::UsageError;

/// The lifecycle state of an [`ArchiveSession`](super::ArchiveSession).
///
/// ```text
/// Unopened ──open──▶ Ready ──advance──▶ EntryActive ──read→0──▶ EntryConsumed
///                      │                                          │
///                      └──────advance→None──▶ Exhausted ◀──────────┘
/// ```
///
/// Any state moves to `Failed` on an open, I/O or decode error, and to
/// `Closed` on close or cancellation. Both are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum SessionState {
    /// Created, `open` not yet called.
    Unopened,
    /// Container opened, no entry produced yet.
    Ready,
    /// An entry is current and its payload has not signaled completion.
    EntryActive,
    /// The current entry signaled end of payload; `advance` is allowed.
    EntryConsumed,
    /// Archive-complete was reported.
    Exhausted,
    /// A previous operation failed; the failure is re-reported.
    Failed,
    /// The session was closed or cancelled.
    Closed,
}

impl SessionState {
    /// Returns `true` when no further entry can be produced.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Exhausted | Self::Failed | Self::Closed)
    }

    /// Returns `true` while a container is open and not exhausted.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Ready | Self::EntryActive | Self::EntryConsumed)
    }

    /// Returns `true` if `advance` is valid in this state.
    pub fn can_advance(&self) -> bool {
        matches!(self, Self::Ready | Self::EntryConsumed)
    }

    /// Checks that `advance` is valid, naming the rule broken otherwise.
    ///
    /// `Failed` is re-reported by the session before this check runs.
    pub(crate) fn check_advance(self) -> std::result::Result<(), UsageError> {
        match self {
            Self::Ready | Self::EntryConsumed => Ok(()),
            Self::Unopened => Err(UsageError::NotOpened),
            Self::EntryActive => Err(UsageError::EntryNotConsumed),
            Self::Exhausted => Err(UsageError::Exhausted),
            Self::Failed | Self::Closed => Err(UsageError::SessionClosed),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Unopened => "unopened",
            Self::Ready => "ready",
            Self::EntryActive => "entry-active",
            Self::EntryConsumed => "entry-consumed",
            Self::Exhausted => "exhausted",
            Self::Failed => "failed",
            Self::Closed => "closed",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
