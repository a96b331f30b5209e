//! # unarchive
//!
//! Streaming extraction of archive containers, one entry at a time.
//!
//! An [`ArchiveSession`] opens a container (tar, optionally wrapped in gzip,
//! bzip2, zstd or xz), produces its entries in container order, and lets the
//! caller read each entry's payload in bounded chunks into a buffer the
//! caller owns. Exactly one entry is current at a time, end of entry and end
//! of archive are signaled unambiguously, and the same buffer can be reused
//! for every read.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use unarchive::{ArchiveSession, Result};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<()> {
//!     let mut session = ArchiveSession::open_path("release.tar.gz").await?;
//!     let mut buf = vec![0u8; 16 * 1024];
//!
//!     while let Some(entry) = session.advance().await? {
//!         println!("{} ({} bytes)", entry.path(), entry.size());
//!         loop {
//!             let n = entry.read(&mut buf).await?;
//!             if n == 0 {
//!                 break; // end of entry
//!             }
//!             // process &buf[..n]
//!         }
//!     }
//!     // `advance` returned None: the archive is complete.
//!     Ok(())
//! }
//! ```
//!
//! ## Session Lifecycle
//!
//! | State | Reached by | Next |
//! |-------|------------|------|
//! | `Unopened` | [`ArchiveSession::new`] | `open` |
//! | `Ready` | successful `open` | `advance` |
//! | `EntryActive` | `advance` returned an entry | `Entry::read` |
//! | `EntryConsumed` | `Entry::read` returned 0 | `advance` |
//! | `Exhausted` | `advance` returned `None` | `close` |
//! | `Failed` | any open, I/O or decode error | `close` |
//! | `Closed` | `close`, cancellation or drop | - |
//!
//! Calls that break the sequence (advancing past an unread entry, reading a
//! stale handle, overlapping two operations) fail with a
//! [`UsageError`] and leave the session untouched.
//!
//! ## Helpers
//!
//! - [`read_loop`]: chunk callbacks, read-to-memory, copy to an async writer
//! - [`events`]: drive a whole archive through a listener
//! - [`binding`]: plug in a different container decoder
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `gzip` | Yes | gzip-compressed tar (`.tar.gz`, `.tgz`) |
//! | `bzip2` | No | bzip2-compressed tar (`.tar.bz2`) |
//! | `zstd` | No | Zstandard-compressed tar (`.tar.zst`) |
//! | `xz` | No | XZ-compressed tar (`.tar.xz`) |
//!
//! ## Logging
//!
//! The crate logs through the [`log`] facade: lifecycle transitions at
//! `debug`, individual reads at `trace`, abandoned operations at `warn`.
//! No logger is installed.
//!
//! ## Minimum Supported Rust Version (MSRV)
//!
//! This crate requires **Rust 1.85** or later.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod binding;
pub mod config;
pub mod error;
pub mod events;
pub mod read_loop;
pub mod session;
pub mod timestamp;

pub use binding::{Compression, DecoderBinding, EntryKind, EntryMeta, TarDecoder};
pub use config::{DEFAULT_READ_BUFFER_SIZE, SessionConfig};
pub use error::{Error, ErrorCategory, Result, UsageError};
pub use events::{EntryAction, RunSummary, SessionListener};
pub use read_loop::ChunkStats;
pub use session::{ArchiveSession, Entry, SessionState};
pub use timestamp::Timestamp;

// Re-export for cancelling sessions from other tasks
pub use tokio_util::sync::CancellationToken;
