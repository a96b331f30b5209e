//! Push-style session driving.
//!
//! [`ArchiveSession::run`] opens a container and walks every entry,
//! reporting progress to a [`SessionListener`]: `ready` once the container
//! is open, `entry` per entry, `data` per chunk, `entry_end` when a payload
//! is complete and `exhausted` at the end. It is a thin loop over
//! [`ArchiveSession::advance`] and [`read_loop::read_chunks`], so the
//! ordering guarantees of the pull API carry over unchanged.
//!
//! # Example
//!
//! ```rust,no_run
//! use unarchive::events::{EntryAction, SessionListener};
//! use unarchive::{ArchiveSession, Entry, Result};
//!
//! #[derive(Default)]
//! struct Sizes(Vec<(String, u64)>);
//!
//! impl SessionListener for Sizes {
//!     fn on_entry(&mut self, entry: &Entry) -> EntryAction {
//!         if entry.path().ends_with(".log") { EntryAction::Read } else { EntryAction::Skip }
//!     }
//!
//!     fn on_entry_end(&mut self, entry: &Entry, bytes: u64) {
//!         self.0.push((entry.path().to_string(), bytes));
//!     }
//! }
//!
//! # async fn demo() -> Result<()> {
//! let mut sizes = Sizes::default();
//! let mut buf = vec![0u8; 16 * 1024];
//! let summary = ArchiveSession::new().run("logs.tar.gz", &mut sizes, &mut buf).await?;
//! println!("{} entries, {} skipped", summary.entries, summary.skipped);
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use crate::binding::DecoderBinding;
use crate::{ArchiveSession, Entry, Error, Result, read_loop};

/// What to do with an entry announced to [`SessionListener::on_entry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EntryAction {
    /// Read the payload and report it through `on_data`.
    #[default]
    Read,
    /// Discard the payload without reporting it.
    Skip,
}

/// Receives session events from [`ArchiveSession::run`].
///
/// Every method has a no-op default.
pub trait SessionListener {
    /// The container at `path` was opened.
    fn on_ready(&mut self, path: &Path) {
        let _ = path;
    }

    /// A new entry is current.
    fn on_entry(&mut self, entry: &Entry) -> EntryAction {
        let _ = entry;
        EntryAction::Read
    }

    /// A chunk of the current entry's payload.
    ///
    /// Returning an error stops the run and returns the error.
    fn on_data(&mut self, entry: &Entry, chunk: &[u8]) -> Result<()> {
        let _ = (entry, chunk);
        Ok(())
    }

    /// The payload of a read entry is complete.
    ///
    /// Not called for skipped entries.
    fn on_entry_end(&mut self, entry: &Entry, bytes: u64) {
        let _ = (entry, bytes);
    }

    /// The archive is complete.
    fn on_exhausted(&mut self, entries: usize) {
        let _ = entries;
    }

    /// The run stopped with `error`; it is also returned by `run`.
    fn on_error(&mut self, error: &Error) {
        let _ = error;
    }
}

/// Totals of one [`ArchiveSession::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Entries announced to the listener.
    pub entries: usize,
    /// Entries the listener asked to skip.
    pub skipped: usize,
    /// Payload bytes delivered through `on_data`.
    pub bytes: u64,
}

impl<D: DecoderBinding> ArchiveSession<D> {
    /// Opens `path` and drives the whole archive through `listener`.
    ///
    /// `buf` is reused for every read.
    ///
    /// # Errors
    ///
    /// Any error from opening, advancing, reading or from
    /// [`SessionListener::on_data`]. The listener's `on_error` sees it first.
    pub async fn run<L>(
        &mut self,
        path: impl AsRef<Path>,
        listener: &mut L,
        buf: &mut [u8],
    ) -> Result<RunSummary>
    where
        L: SessionListener + ?Sized,
    {
        let result = self.drive(path.as_ref(), listener, buf).await;
        if let Err(e) = &result {
            listener.on_error(e);
        }
        result
    }

    async fn drive<L>(
        &mut self,
        path: &Path,
        listener: &mut L,
        buf: &mut [u8],
    ) -> Result<RunSummary>
    where
        L: SessionListener + ?Sized,
    {
        self.open(path).await?;
        listener.on_ready(path);

        let mut summary = RunSummary::default();
        while let Some(entry) = self.advance().await? {
            summary.entries += 1;
            match listener.on_entry(&entry) {
                EntryAction::Read => {
                    let stats = read_loop::read_chunks(&entry, buf, |chunk| {
                        listener.on_data(&entry, chunk)
                    })
                    .await?;
                    summary.bytes += stats.bytes;
                    listener.on_entry_end(&entry, stats.bytes);
                }
                EntryAction::Skip => {
                    summary.skipped += 1;
                    read_loop::skip(&entry, buf).await?;
                }
            }
        }
        listener.on_exhausted(summary.entries);
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::EntryMeta;
    use crate::SessionConfig;

    struct Three {
        next: usize,
        served: bool,
    }

    impl DecoderBinding for Three {
        fn open_container(path: &Path, _config: &SessionConfig) -> Result<Self> {
            if path.as_os_str() == "absent" {
                return Err(Error::NotFound {
                    path: path.to_path_buf(),
                });
            }
            Ok(Self {
                next: 0,
                served: false,
            })
        }

        fn next_entry(&mut self) -> Result<Option<EntryMeta>> {
            if self.next == 3 {
                return Ok(None);
            }
            self.next += 1;
            self.served = false;
            Ok(Some(EntryMeta::new(self.next - 1, format!("{}.txt", self.next - 1), 4)))
        }

        fn read_entry_chunk(&mut self, dest: &mut [u8]) -> Result<usize> {
            if self.served {
                return Ok(0);
            }
            self.served = true;
            dest[..4].copy_from_slice(b"four");
            Ok(4)
        }
    }

    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
    }

    impl SessionListener for Recorder {
        fn on_ready(&mut self, _path: &Path) {
            self.events.push("ready".into());
        }

        fn on_entry(&mut self, entry: &Entry) -> EntryAction {
            self.events.push(format!("entry {}", entry.path()));
            if entry.index() == 1 {
                EntryAction::Skip
            } else {
                EntryAction::Read
            }
        }

        fn on_data(&mut self, _entry: &Entry, chunk: &[u8]) -> Result<()> {
            self.events.push(format!("data {}", chunk.len()));
            Ok(())
        }

        fn on_entry_end(&mut self, entry: &Entry, bytes: u64) {
            self.events.push(format!("end {} {}", entry.index(), bytes));
        }

        fn on_exhausted(&mut self, entries: usize) {
            self.events.push(format!("exhausted {}", entries));
        }

        fn on_error(&mut self, error: &Error) {
            self.events.push(format!("error {}", error.category()));
        }
    }

    #[tokio::test]
    async fn test_event_order() {
        let mut session = ArchiveSession::<Three>::with_binding(SessionConfig::default());
        let mut recorder = Recorder::default();
        let mut buf = [0u8; 16];
        let summary = session.run("three", &mut recorder, &mut buf).await.unwrap();

        assert_eq!(
            summary,
            RunSummary {
                entries: 3,
                skipped: 1,
                bytes: 8
            }
        );
        assert_eq!(
            recorder.events,
            vec![
                "ready",
                "entry 0.txt",
                "data 4",
                "end 0 4",
                "entry 1.txt",
                "entry 2.txt",
                "data 4",
                "end 2 4",
                "exhausted 3",
            ]
        );
    }

    #[tokio::test]
    async fn test_open_error_reaches_listener() {
        let mut session = ArchiveSession::<Three>::with_binding(SessionConfig::default());
        let mut recorder = Recorder::default();
        let mut buf = [0u8; 16];
        let err = session
            .run("absent", &mut recorder, &mut buf)
            .await
            .unwrap_err();
        assert!(err.is_open_error());
        assert_eq!(recorder.events, vec!["error open"]);
    }
}
