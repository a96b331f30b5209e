//! Decoder bindings: the container-level collaborator of a session.
//!
//! A [`DecoderBinding`] knows how to open a container, step to the next
//! entry header, and read the current entry's decompressed payload. It is a
//! plain blocking API; the session runs it on a dedicated worker thread and
//! enforces all sequencing rules on top, so a binding only has to be correct
//! for well-ordered calls.
//!
//! The crate ships [`TarDecoder`], which reads tar containers that are
//! optionally wrapped in gzip, bzip2, zstd or xz (see [`Compression`]).
//!
//! # Implementing a Binding
//!
//! ```rust
//! use std::path::Path;
//! use unarchive::binding::{DecoderBinding, EntryKind, EntryMeta};
//! use unarchive::{Result, SessionConfig};
//!
//! /// A container holding a single in-memory entry.
//! struct Single {
//!     data: Vec<u8>,
//!     pos: usize,
//!     served: bool,
//! }
//!
//! impl DecoderBinding for Single {
//!     fn open_container(_path: &Path, _config: &SessionConfig) -> Result<Self> {
//!         Ok(Self { data: b"hello".to_vec(), pos: 0, served: false })
//!     }
//!
//!     fn next_entry(&mut self) -> Result<Option<EntryMeta>> {
//!         if self.served {
//!             return Ok(None);
//!         }
//!         self.served = true;
//!         Ok(Some(EntryMeta::new(0, "hello.txt", self.data.len() as u64)))
//!     }
//!
//!     fn read_entry_chunk(&mut self, dest: &mut [u8]) -> Result<usize> {
//!         let n = dest.len().min(self.data.len() - self.pos);
//!         dest[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
//!         self.pos += n;
//!         Ok(n)
//!     }
//! }
//! ```

pub mod compression;
mod tar_decoder;

use std::path::Path;

use crate::{Result, SessionConfig, Timestamp};

pub use self::compression::Compression;
pub use self::tar_decoder::TarDecoder;

/// The container-level operations a session needs from a decoder.
///
/// Calls arrive strictly in order from a single thread:
/// `open_container`, then alternating `next_entry` and zero or more
/// `read_entry_chunk` calls. Bindings are moved to the worker thread, hence
/// the `Send + 'static` bound.
pub trait DecoderBinding: Send + Sized + 'static {
    /// Opens the container at `path`.
    ///
    /// # Errors
    ///
    /// Should return an open-class error (`NotFound`, `UnsupportedFormat` or
    /// `Open`) when the container cannot be used.
    fn open_container(path: &Path, config: &SessionConfig) -> Result<Self>;

    /// Moves to the next entry and returns its metadata.
    ///
    /// Returns `Ok(None)` at the end of the archive. Any unread payload of
    /// the previous entry is discarded.
    fn next_entry(&mut self) -> Result<Option<EntryMeta>>;

    /// Reads up to `dest.len()` bytes of the current entry's payload.
    ///
    /// Returns `Ok(0)` once the payload is exhausted. `dest` is never empty.
    fn read_entry_chunk(&mut self, dest: &mut [u8]) -> Result<usize>;
}

/// The type of an archive entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum EntryKind {
    /// A regular file.
    File,
    /// A directory.
    Directory,
    /// A symbolic link; see [`EntryMeta::link_target`].
    Symlink,
    /// A hard link to an earlier entry; see [`EntryMeta::link_target`].
    HardLink,
    /// Devices, FIFOs and anything else.
    Other,
}

/// Metadata of one archive entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryMeta {
    /// 0-based position of the entry in the container.
    pub index: usize,
    /// The entry path as stored in the archive.
    pub path: String,
    /// Declared payload size in bytes; `None` when the format streams the
    /// payload without announcing its length.
    pub size: Option<u64>,
    /// Modification time, if recorded.
    pub mtime: Option<Timestamp>,
    /// The entry type.
    pub kind: EntryKind,
    /// Unix permission bits, if recorded.
    pub mode: Option<u32>,
    /// Link target for symlinks and hard links.
    pub link_target: Option<String>,
}

impl EntryMeta {
    /// Creates metadata for a regular file with no optional fields.
    pub fn new(index: usize, path: impl Into<String>, size: u64) -> Self {
        Self {
            index,
            path: path.into(),
            size: Some(size),
            mtime: None,
            kind: EntryKind::File,
            mode: None,
            link_target: None,
        }
    }

    /// Sets the modification time.
    pub fn with_mtime(mut self, mtime: Timestamp) -> Self {
        self.mtime = Some(mtime);
        self
    }

    /// Marks the payload size as unknown.
    pub fn with_unknown_size(mut self) -> Self {
        self.size = None;
        self
    }

    /// Sets the entry kind.
    pub fn with_kind(mut self, kind: EntryKind) -> Self {
        self.kind = kind;
        self
    }

    /// Returns true if this is a directory.
    pub fn is_directory(&self) -> bool {
        self.kind == EntryKind::Directory
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_meta_builder() {
        let meta = EntryMeta::new(3, "dir/", 0)
            .with_kind(EntryKind::Directory)
            .with_mtime(Timestamp::from_unix_secs(42));
        assert_eq!(meta.index, 3);
        assert!(meta.is_directory());
        assert_eq!(meta.mtime.map(|t| t.as_unix_secs()), Some(42));
        assert!(meta.link_target.is_none());
        assert_eq!(meta.size, Some(0));
    }

    #[test]
    fn test_unknown_size() {
        let meta = EntryMeta::new(0, "stream", 0).with_unknown_size();
        assert_eq!(meta.size, None);
    }
}
