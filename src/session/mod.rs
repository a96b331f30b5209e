//! Archive sessions and entry handles.
//!
//! An [`ArchiveSession`] owns one opened container and hands out at most
//! one current [`Entry`] at a time. The session and every entry handle share
//! one piece of state behind a mutex; all sequencing rules are checked there
//! before any request reaches the decoder worker, so a usage error never
//! disturbs the decoder's position.
//!
//! Operations are `async` and suspend while the worker decodes. Each
//! session allows one outstanding operation; an overlapping call gets
//! [`UsageError::OperationInFlight`].

mod archive;
mod entry;
mod state;
mod worker;

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::binding::EntryMeta;
use crate::{Error, ErrorCategory, Result, SessionConfig, UsageError};

pub use self::archive::ArchiveSession;
pub use self::entry::Entry;
pub use self::state::SessionState;

use self::worker::WorkerHandle;

/// State shared by a session and its entry handles.
pub(crate) struct Shared {
    inner: Mutex<Inner>,
    cancel: CancellationToken,
    config: SessionConfig,
}

struct Inner {
    state: SessionState,
    /// Bumped by every successful `advance`; entry handles carry the value
    /// they were created with.
    generation: u64,
    busy: bool,
    worker: Option<WorkerHandle>,
    current: Option<Progress>,
    /// The re-reported form of the failure that moved the session to `Failed`.
    failure: Option<Error>,
    entries_seen: usize,
    /// Buffer lent to the worker for reads, reused across reads.
    scratch: Vec<u8>,
    path: Option<PathBuf>,
}

/// Payload progress of the current entry.
struct Progress {
    meta: Arc<EntryMeta>,
    bytes: u64,
}

impl Shared {
    fn new(config: SessionConfig) -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: SessionState::Unopened,
                generation: 0,
                busy: false,
                worker: None,
                current: None,
                failure: None,
                entries_seen: 0,
                scratch: Vec::new(),
                path: None,
            }),
            cancel: CancellationToken::new(),
            config,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // Inner is only mutated in short sections that cannot leave it
        // half-updated, so a poisoned lock is still usable.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Rejects operations on failed or closed sessions.
    ///
    /// A cancelled token is treated as a close request that has not been
    /// applied yet.
    fn check_live(&self, inner: &mut Inner) -> Result<()> {
        if self.cancel.is_cancelled() && inner.state != SessionState::Closed {
            self.close_locked(inner);
        }
        match inner.state {
            SessionState::Failed => Err(replay(inner)),
            SessionState::Closed => Err(UsageError::SessionClosed.into()),
            _ => Ok(()),
        }
    }

    fn close(&self) {
        let mut inner = self.lock();
        self.close_locked(&mut inner);
    }

    fn close_locked(&self, inner: &mut Inner) {
        if inner.state != SessionState::Closed {
            log::debug!(
                "closing session in state {} after {} entries",
                inner.state,
                inner.entries_seen
            );
            inner.state = SessionState::Closed;
            inner.worker = None;
            inner.current = None;
            inner.scratch = Vec::new();
        }
        self.cancel.cancel();
    }

    /// Waits for a worker reply, giving up when the session is cancelled.
    async fn wait<T>(&self, reply: oneshot::Receiver<T>) -> Result<T> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Error::Cancelled),
            reply = reply => reply.map_err(|_| worker::stopped()),
        }
    }

    /// Applies the outcome of a failed operation after it settled.
    fn finish_with_error(&self, inner: &mut Inner, error: Error) -> Error {
        match error {
            Error::Cancelled => {
                self.close_locked(inner);
                Error::Cancelled
            }
            error => fail(inner, error),
        }
    }
}

/// Moves the session to `Failed`, returning the error for the current caller.
fn fail(inner: &mut Inner, error: Error) -> Error {
    log::debug!("session failed in state {}: {}", inner.state, error);
    inner.state = SessionState::Failed;
    inner.failure = Some(error.to_session_failed());
    inner.worker = None;
    error
}

fn replay(inner: &Inner) -> Error {
    match &inner.failure {
        Some(failure) => failure.to_session_failed(),
        None => Error::SessionFailed {
            category: ErrorCategory::Io,
            message: "session failed".into(),
        },
    }
}

/// Marks an operation as outstanding for as long as it lives.
///
/// If the operation's future is dropped before [`InFlight::settle`], the
/// decoder position is unknown and the session fails.
struct InFlight<'a> {
    shared: &'a Shared,
    operation: &'static str,
    armed: bool,
}

impl<'a> InFlight<'a> {
    fn start(shared: &'a Shared, inner: &mut Inner, operation: &'static str) -> Self {
        inner.busy = true;
        Self {
            shared,
            operation,
            armed: true,
        }
    }

    /// Ends the operation and returns the locked state to apply its outcome.
    fn settle(mut self) -> MutexGuard<'a, Inner> {
        self.armed = false;
        let mut inner = self.shared.lock();
        inner.busy = false;
        inner
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut inner = self.shared.lock();
        inner.busy = false;
        if matches!(inner.state, SessionState::Closed | SessionState::Failed) {
            return;
        }
        log::warn!(
            "{} was abandoned before completion; failing the session",
            self.operation
        );
        fail(
            &mut inner,
            Error::SessionFailed {
                category: ErrorCategory::Cancelled,
                message: format!("{} was abandoned before completion", self.operation),
            },
        );
    }
}
