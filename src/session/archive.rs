//! The archive session.

use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use super::worker::{self, Request};
use super::{Entry, InFlight, Progress, SessionState, Shared};
use crate::binding::{DecoderBinding, TarDecoder};
use crate::{Error, Result, SessionConfig, UsageError, read_loop};

/// A streaming session over one archive container.
///
/// The session opens the container, produces entries in container order
/// with [`advance`](Self::advance), and guarantees that exactly one entry is
/// current at a time. Payloads are read through the returned [`Entry`].
///
/// The type parameter selects the [`DecoderBinding`]; it defaults to
/// [`TarDecoder`].
///
/// # Example
///
/// ```rust,no_run
/// use unarchive::{ArchiveSession, Result};
///
/// # async fn demo() -> Result<()> {
/// let mut session = ArchiveSession::open_path("bundle.tar.gz").await?;
/// let mut buf = vec![0u8; 16 * 1024];
///
/// while let Some(entry) = session.advance().await? {
///     let mut total = 0;
///     loop {
///         let n = entry.read(&mut buf).await?;
///         if n == 0 {
///             break;
///         }
///         total += n;
///     }
///     println!("{}: {} bytes", entry.path(), total);
/// }
/// # Ok(())
/// # }
/// ```
pub struct ArchiveSession<D: DecoderBinding = TarDecoder> {
    shared: Arc<Shared>,
    _binding: PhantomData<fn() -> D>,
}

impl ArchiveSession<TarDecoder> {
    /// Creates an unopened session with the default configuration.
    pub fn new() -> Self {
        Self::with_binding(SessionConfig::default())
    }

    /// Creates an unopened session with the given configuration.
    pub fn with_config(config: SessionConfig) -> Self {
        Self::with_binding(config)
    }

    /// Creates a session and opens the container at `path`.
    ///
    /// # Errors
    ///
    /// Returns an open-class error if the container cannot be opened.
    pub async fn open_path(path: impl AsRef<Path>) -> Result<Self> {
        let mut session = Self::new();
        session.open(path).await?;
        Ok(session)
    }
}

impl Default for ArchiveSession<TarDecoder> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: DecoderBinding> ArchiveSession<D> {
    /// Creates an unopened session that decodes with binding `D`.
    ///
    /// ```rust,ignore
    /// let session = ArchiveSession::<MyBinding>::with_binding(SessionConfig::default());
    /// ```
    pub fn with_binding(config: SessionConfig) -> Self {
        Self {
            shared: Arc::new(Shared::new(config)),
            _binding: PhantomData,
        }
    }

    /// Returns the session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.shared.config
    }

    /// Returns the current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.shared.lock().state
    }

    /// Returns the number of entries produced so far.
    pub fn entries_seen(&self) -> usize {
        self.shared.lock().entries_seen
    }

    /// Returns the path passed to [`open`](Self::open), if any.
    pub fn path(&self) -> Option<PathBuf> {
        self.shared.lock().path.clone()
    }

    /// Returns a token that closes the session when cancelled.
    ///
    /// Cancelling it from another task makes an outstanding operation
    /// complete with [`Error::Cancelled`].
    pub fn cancellation_token(&self) -> CancellationToken {
        self.shared.cancel.clone()
    }

    /// Returns a handle to the current entry, if one is current.
    ///
    /// The handle is also returned after the entry signaled end of payload;
    /// reading from it then reports [`UsageError::EntryConsumed`].
    pub fn current(&self) -> Option<Entry> {
        let inner = self.shared.lock();
        match inner.state {
            SessionState::EntryActive | SessionState::EntryConsumed => {
                inner.current.as_ref().map(|progress| {
                    Entry::new(
                        Arc::clone(&self.shared),
                        inner.generation,
                        Arc::clone(&progress.meta),
                    )
                })
            }
            _ => None,
        }
    }

    /// Opens the container at `path`.
    ///
    /// On success the session is `Ready`. On failure it is `Failed` and the
    /// container is released.
    ///
    /// # Errors
    ///
    /// * [`Error::NotFound`], [`Error::UnsupportedFormat`] or [`Error::Open`]
    ///   if the container cannot be used
    /// * [`Error::InvalidConfig`] if the configuration does not validate
    /// * [`UsageError::AlreadyOpened`] on a second call
    /// * [`Error::Cancelled`] if the session is closed while opening
    pub async fn open(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref().to_path_buf();
        let shared = &*self.shared;
        let guard = {
            let mut inner = shared.lock();
            shared.check_live(&mut inner)?;
            if inner.busy {
                return Err(UsageError::OperationInFlight.into());
            }
            if inner.state != SessionState::Unopened {
                return Err(UsageError::AlreadyOpened.into());
            }
            shared.config.validate()?;
            inner.path = Some(path.clone());
            InFlight::start(shared, &mut inner, "open")
        };

        log::debug!("opening archive {}", path.display());
        let outcome = match worker::spawn::<D>(path, shared.config.clone()) {
            Ok((handle, opened)) => shared
                .wait(opened)
                .await
                .and_then(|result| result)
                .map(|()| handle),
            Err(e) => Err(e),
        };

        let mut inner = guard.settle();
        if inner.state == SessionState::Closed {
            return Err(Error::Cancelled);
        }
        match outcome {
            Ok(handle) => {
                inner.worker = Some(handle);
                inner.state = SessionState::Ready;
                Ok(())
            }
            Err(e) => Err(shared.finish_with_error(&mut inner, e)),
        }
    }

    /// Moves to the next entry.
    ///
    /// Returns `Ok(Some(entry))` for the next entry in container order and
    /// `Ok(None)` exactly once when the archive is complete. The previous
    /// entry handle becomes stale.
    ///
    /// # Errors
    ///
    /// * [`UsageError::EntryNotConsumed`] if the current entry has not
    ///   signaled end of payload (see [`skip_current`](Self::skip_current))
    /// * [`UsageError::Exhausted`] after archive-complete was reported
    /// * [`UsageError::NotOpened`] before [`open`](Self::open)
    /// * a decode-class error if the next header is damaged; the session is
    ///   then `Failed`
    /// * [`Error::ResourceLimitExceeded`] if `max_entries` or
    ///   `max_entry_size` is exceeded
    pub async fn advance(&mut self) -> Result<Option<Entry>> {
        let shared = &*self.shared;
        let (handle, guard) = {
            let mut inner = shared.lock();
            shared.check_live(&mut inner)?;
            if inner.busy {
                return Err(UsageError::OperationInFlight.into());
            }
            inner.state.check_advance()?;
            let handle = inner
                .worker
                .clone()
                .ok_or(Error::Usage(UsageError::NotOpened))?;
            (handle, InFlight::start(shared, &mut inner, "advance"))
        };

        let (reply, next) = oneshot::channel();
        let outcome = match handle.send(Request::Next { reply }) {
            Ok(()) => shared.wait(next).await.and_then(|result| result),
            Err(_) => Err(worker::stopped()),
        };

        let mut inner = guard.settle();
        if inner.state == SessionState::Closed {
            return Err(Error::Cancelled);
        }
        let meta = match outcome {
            Ok(Some(meta)) => meta,
            Ok(None) => {
                log::debug!("archive complete after {} entries", inner.entries_seen);
                inner.generation += 1;
                inner.current = None;
                inner.state = SessionState::Exhausted;
                return Ok(None);
            }
            Err(e) => return Err(shared.finish_with_error(&mut inner, e)),
        };

        if inner.entries_seen >= shared.config.max_entries {
            let error = Error::ResourceLimitExceeded(format!(
                "archive has more than {} entries",
                shared.config.max_entries
            ));
            return Err(super::fail(&mut inner, error));
        }
        if let (Some(limit), Some(size)) = (shared.config.max_entry_size, meta.size) {
            if size > limit {
                let error = Error::ResourceLimitExceeded(format!(
                    "entry {} ('{}') declares {} bytes, limit is {}",
                    meta.index, meta.path, size, limit
                ));
                return Err(super::fail(&mut inner, error));
            }
        }

        log::debug!(
            "entry {} '{}' ({:?} bytes, {:?})",
            meta.index,
            meta.path,
            meta.size,
            meta.kind
        );
        let meta = Arc::new(meta);
        inner.generation += 1;
        inner.entries_seen += 1;
        inner.current = Some(Progress {
            meta: Arc::clone(&meta),
            bytes: 0,
        });
        inner.state = SessionState::EntryActive;
        Ok(Some(Entry::new(
            Arc::clone(&self.shared),
            inner.generation,
            meta,
        )))
    }

    /// Drains the current entry's remaining payload.
    ///
    /// Returns the number of bytes discarded; `0` when no entry is active.
    /// Afterwards the session is `EntryConsumed` and `advance` may proceed.
    ///
    /// # Errors
    ///
    /// Any error [`Entry::read`] reports while draining.
    pub async fn skip_current(&mut self) -> Result<u64> {
        let entry = {
            let mut inner = self.shared.lock();
            self.shared.check_live(&mut inner)?;
            match inner.state {
                SessionState::Unopened => return Err(UsageError::NotOpened.into()),
                SessionState::Exhausted => return Err(UsageError::Exhausted.into()),
                SessionState::EntryActive => match inner.current.as_ref() {
                    Some(progress) => Entry::new(
                        Arc::clone(&self.shared),
                        inner.generation,
                        Arc::clone(&progress.meta),
                    ),
                    None => return Ok(0),
                },
                _ => return Ok(0),
            }
        };
        let mut buf = vec![0u8; self.shared.config.read_buffer_size];
        read_loop::skip(&entry, &mut buf).await
    }

    /// Closes the session.
    ///
    /// An outstanding operation completes with [`Error::Cancelled`]; later
    /// operations report [`UsageError::SessionClosed`]. The container is
    /// released once the worker finishes its current step. Closing twice is
    /// a no-op.
    pub fn close(&self) {
        self.shared.close();
    }
}

impl<D: DecoderBinding> Drop for ArchiveSession<D> {
    fn drop(&mut self) {
        self.shared.close();
    }
}

impl<D: DecoderBinding> std::fmt::Debug for ArchiveSession<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.shared.lock();
        f.debug_struct("ArchiveSession")
            .field("state", &inner.state)
            .field("path", &inner.path)
            .field("entries_seen", &inner.entries_seen)
            .finish_non_exhaustive()
    }
}
