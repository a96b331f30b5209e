//! Entry handles.

use std::sync::Arc;

use tokio::sync::oneshot;

use super::worker::{self, Request};
use super::{InFlight, Inner, SessionState, Shared};
use crate::binding::{EntryKind, EntryMeta};
use crate::{Error, Result, Timestamp, UsageError};

/// A view of one archive entry.
///
/// An `Entry` is returned by [`ArchiveSession::advance`] and stays readable
/// until its payload signals completion or the session advances. It owns no
/// buffer: every [`read`](Self::read) fills a buffer supplied by the caller.
///
/// Handles are cheap to clone; all clones share one read position.
///
/// [`ArchiveSession::advance`]: super::ArchiveSession::advance
#[derive(Clone)]
pub struct Entry {
    shared: Arc<Shared>,
    generation: u64,
    meta: Arc<EntryMeta>,
}

impl Entry {
    pub(super) fn new(shared: Arc<Shared>, generation: u64, meta: Arc<EntryMeta>) -> Self {
        Self {
            shared,
            generation,
            meta,
        }
    }

    /// Returns the entry path as stored in the archive.
    pub fn path(&self) -> &str {
        &self.meta.path
    }

    /// Returns the declared payload size in bytes, or 0 when it is unknown.
    pub fn size(&self) -> u64 {
        self.meta.size.unwrap_or(0)
    }

    /// Returns the declared payload size, if the format announced one.
    pub fn declared_size(&self) -> Option<u64> {
        self.meta.size
    }

    /// Returns the modification time, if recorded.
    pub fn mtime(&self) -> Option<Timestamp> {
        self.meta.mtime
    }

    /// Returns the entry type.
    pub fn kind(&self) -> EntryKind {
        self.meta.kind
    }

    /// Returns the Unix permission bits, if recorded.
    pub fn mode(&self) -> Option<u32> {
        self.meta.mode
    }

    /// Returns the link target of a symlink or hard link.
    pub fn link_target(&self) -> Option<&str> {
        self.meta.link_target.as_deref()
    }

    /// Returns the 0-based position of the entry in the container.
    pub fn index(&self) -> usize {
        self.meta.index
    }

    /// Returns the full metadata snapshot.
    pub fn meta(&self) -> &EntryMeta {
        &self.meta
    }

    /// Returns `true` while this handle may still be read.
    pub fn is_current(&self) -> bool {
        let inner = self.shared.lock();
        inner.generation == self.generation && inner.state == SessionState::EntryActive
    }

    /// Reads the next chunk of payload into `buf`.
    ///
    /// Fills `buf[..n]` and returns `n`, continuing where the previous read
    /// stopped. `Ok(0)` signals the end of the payload; the session then
    /// allows [`advance`](super::ArchiveSession::advance). Bytes past `n` are
    /// left untouched.
    ///
    /// # Errors
    ///
    /// Usage errors are reported without touching the decoder:
    ///
    /// * [`UsageError::StaleEntry`] if the session already advanced
    /// * [`UsageError::EntryConsumed`] after the payload signaled its end
    /// * [`UsageError::EmptyBuffer`] if `buf` is empty
    /// * [`UsageError::OperationInFlight`] if another operation is running
    /// * [`UsageError::SessionClosed`] if the session was closed
    ///
    /// Decode-class errors ([`Error::Corrupt`], [`Error::Truncated`]) end
    /// the entry and fail the session.
    pub async fn read(&self, buf: &mut [u8]) -> Result<usize> {
        let shared = &*self.shared;
        let (handle, scratch, guard) = {
            let mut inner = shared.lock();
            shared.check_live(&mut inner)?;
            if inner.generation != self.generation {
                return Err(UsageError::StaleEntry.into());
            }
            if inner.state != SessionState::EntryActive {
                return Err(UsageError::EntryConsumed.into());
            }
            if buf.is_empty() {
                return Err(UsageError::EmptyBuffer.into());
            }
            if inner.busy {
                return Err(UsageError::OperationInFlight.into());
            }
            let handle = inner
                .worker
                .clone()
                .ok_or(Error::Usage(UsageError::SessionClosed))?;
            let mut scratch = std::mem::take(&mut inner.scratch);
            scratch.resize(buf.len(), 0);
            (handle, scratch, InFlight::start(shared, &mut inner, "read"))
        };

        let (reply, chunk) = oneshot::channel();
        let outcome = match handle.send(Request::Read { scratch, reply }) {
            Ok(()) => shared.wait(chunk).await,
            Err(_) => Err(worker::stopped()),
        };

        let mut inner = guard.settle();
        if inner.state == SessionState::Closed {
            return Err(Error::Cancelled);
        }
        let (scratch, result) = match outcome {
            Ok(reply) => reply,
            Err(e) => return Err(shared.finish_with_error(&mut inner, e)),
        };
        let n = match result {
            Ok(n) if n <= buf.len() => n,
            Ok(n) => {
                let error = self.corrupt(format!(
                    "decoder returned {} bytes for a {}-byte buffer",
                    n,
                    buf.len()
                ));
                return Err(super::fail(&mut inner, error));
            }
            Err(e) => {
                inner.scratch = scratch;
                return Err(super::fail(&mut inner, e));
            }
        };
        buf[..n].copy_from_slice(&scratch[..n]);
        inner.scratch = scratch;
        self.record(&mut inner, n)
    }

    /// Accounts for `n` delivered bytes and applies the size rules.
    fn record(&self, inner: &mut Inner, n: usize) -> Result<usize> {
        let config = &self.shared.config;
        let bytes = match inner.current.as_mut() {
            Some(progress) => {
                progress.bytes += n as u64;
                progress.bytes
            }
            None => return Ok(n),
        };

        let declared = self.meta.size.filter(|_| config.strict_sizes);

        if n == 0 {
            if let Some(expected) = declared.filter(|&expected| bytes != expected) {
                let error = Error::Truncated {
                    entry_index: self.meta.index,
                    entry_name: Some(self.meta.path.clone()),
                    expected,
                    actual: bytes,
                };
                return Err(super::fail(inner, error));
            }
            log::trace!("entry {} consumed ({} bytes)", self.meta.index, bytes);
            inner.state = SessionState::EntryConsumed;
            return Ok(0);
        }

        if let Some(expected) = declared.filter(|&expected| bytes > expected) {
            let error =
                self.corrupt(format!("payload exceeds declared size of {} bytes", expected));
            return Err(super::fail(inner, error));
        }
        if let Some(limit) = config.max_entry_size {
            if bytes > limit {
                let error = Error::ResourceLimitExceeded(format!(
                    "entry {} ('{}') exceeds {} bytes",
                    self.meta.index, self.meta.path, limit
                ));
                return Err(super::fail(inner, error));
            }
        }
        log::trace!("read {} bytes from entry {}", n, self.meta.index);
        Ok(n)
    }

    fn corrupt(&self, reason: String) -> Error {
        Error::Corrupt {
            entry_index: Some(self.meta.index),
            entry_name: Some(self.meta.path.clone()),
            reason,
        }
    }
}

impl std::fmt::Debug for Entry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Entry")
            .field("index", &self.meta.index)
            .field("path", &self.meta.path)
            .field("size", &self.meta.size)
            .field("generation", &self.generation)
            .finish()
    }
}
