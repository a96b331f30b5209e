//! Tar container decoder.
//!
//! Headers are interpreted here rather than through `tar::Archive`, because
//! the archive's entry iterator borrows the archive and cannot be held by a
//! long-lived owner. The `tar` crate still decodes every header field and
//! PAX record.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

use tar::{Header, PaxExtensions};

use super::compression::Compression;
use super::{DecoderBinding, EntryKind, EntryMeta};
use crate::{Error, Result, SessionConfig, Timestamp};

const BLOCK_SIZE: u64 = 512;

/// Upper bound for GNU long name and PAX header payloads.
const MAX_EXTENSION_SIZE: u64 = 1024 * 1024;

/// Outcome of reading one 512-byte block.
enum Block {
    Full,
    /// Clean end of stream at a block boundary.
    Eof,
    /// The stream ended inside the block after this many bytes.
    Partial(usize),
}

/// Extended metadata collected from GNU and PAX headers for the next entry.
#[derive(Default)]
struct PendingExtensions {
    path: Option<Vec<u8>>,
    link_target: Option<Vec<u8>>,
    size: Option<u64>,
    mtime: Option<Timestamp>,
}

/// The entry whose payload is being read.
struct CurrentEntry {
    index: usize,
    path: String,
    size: u64,
    remaining: u64,
}

/// A [`DecoderBinding`] for tar containers.
///
/// Supports plain tar and tar wrapped in gzip, bzip2, zstd or xz (subject to
/// crate features), ustar/GNU/PAX headers, GNU long names and long links.
pub struct TarDecoder {
    reader: Box<dyn Read + Send>,
    compression: Compression,
    /// The first header block, read while validating the container.
    first_block: Option<Header>,
    current: Option<CurrentEntry>,
    /// Padding still to skip after the current entry's payload.
    padding: u64,
    next_index: usize,
    /// Offset in the decoded tar stream.
    position: u64,
    verify_checksums: bool,
    finished: bool,
}

impl std::fmt::Debug for TarDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TarDecoder")
            .field("compression", &self.compression)
            .field("next_index", &self.next_index)
            .field("position", &self.position)
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

impl TarDecoder {
    /// Returns the container's outer compression.
    pub fn compression(&self) -> Compression {
        self.compression
    }

    /// Reads one block, tolerating short reads from decompressors.
    fn read_block(&mut self, block: &mut [u8; BLOCK_SIZE as usize]) -> io::Result<Block> {
        let mut filled = 0;
        while filled < block.len() {
            match self.reader.read(&mut block[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        self.position += filled as u64;
        Ok(match filled {
            0 => Block::Eof,
            n if n == block.len() => Block::Full,
            n => Block::Partial(n),
        })
    }

    /// Returns the next header block, or `None` at the end of the stream.
    fn next_header(&mut self) -> Result<Option<Header>> {
        if let Some(header) = self.first_block.take() {
            return Ok(Some(header));
        }
        let mut header = Header::new_old();
        match self.read_block(header.as_mut_bytes()) {
            Ok(Block::Full) => Ok(Some(header)),
            Ok(Block::Eof) => {
                log::debug!(
                    "tar stream ended without end-of-archive marker at offset {}",
                    self.position
                );
                Ok(None)
            }
            Ok(Block::Partial(n)) => Err(self.corrupt(format!(
                "stream ends inside a header block ({} of {} bytes)",
                n, BLOCK_SIZE
            ))),
            Err(e) => Err(self.stream_error(e)),
        }
    }

    /// Discards `count` bytes of the decoded stream, returning how many were available.
    fn discard(&mut self, count: u64) -> Result<u64> {
        let mut limited = (&mut self.reader).take(count);
        let copied = io::copy(&mut limited, &mut io::sink());
        let copied = copied.map_err(|e| self.stream_error(e))?;
        self.position += copied;
        Ok(copied)
    }

    /// Skips whatever is left of the current entry, including padding.
    fn finish_current(&mut self) -> Result<()> {
        if let Some(current) = self.current.take() {
            if current.remaining > 0 {
                let skipped = self.discard(current.remaining)?;
                if skipped < current.remaining {
                    return Err(Error::Truncated {
                        entry_index: current.index,
                        entry_name: Some(current.path),
                        expected: current.size,
                        actual: current.size - current.remaining + skipped,
                    });
                }
            }
        }
        if self.padding > 0 {
            let padding = std::mem::take(&mut self.padding);
            if self.discard(padding)? < padding {
                log::warn!("tar stream ends inside entry padding; treating as end of archive");
                self.finished = true;
            }
        }
        Ok(())
    }

    /// Reads the payload of a GNU long name or PAX header.
    fn read_extension(&mut self, size: u64) -> Result<Vec<u8>> {
        if size > MAX_EXTENSION_SIZE {
            return Err(Error::ResourceLimitExceeded(format!(
                "extended header of {} bytes exceeds limit of {}",
                size, MAX_EXTENSION_SIZE
            )));
        }
        let mut data = vec![0u8; size as usize];
        let mut filled = 0;
        while filled < data.len() {
            match self.reader.read(&mut data[filled..]) {
                Ok(0) => {
                    return Err(self.corrupt("stream ends inside an extended header".into()));
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(self.stream_error(e)),
            }
        }
        self.position += size;
        let padding = padding_for(size);
        if self.discard(padding)? < padding {
            return Err(self.corrupt("stream ends inside extended header padding".into()));
        }
        Ok(data)
    }

    fn apply_pax(&self, data: &[u8], pending: &mut PendingExtensions) -> Result<()> {
        for record in PaxExtensions::new(data) {
            let record = record.map_err(|e| self.corrupt(format!("invalid PAX record: {}", e)))?;
            let key = match record.key() {
                Ok(key) => key,
                Err(_) => {
                    log::warn!("skipping PAX record with a non UTF-8 key");
                    continue;
                }
            };
            match key {
                "path" => pending.path = Some(record.value_bytes().to_vec()),
                "linkpath" => pending.link_target = Some(record.value_bytes().to_vec()),
                "size" => {
                    let size = record
                        .value()
                        .ok()
                        .and_then(|v| v.trim().parse::<u64>().ok())
                        .ok_or_else(|| self.corrupt("invalid PAX size record".into()))?;
                    pending.size = Some(size);
                }
                "mtime" => match record.value().ok().and_then(Timestamp::parse_pax) {
                    Some(ts) => pending.mtime = Some(ts),
                    None => log::warn!("ignoring unparsable PAX mtime record"),
                },
                _ => {}
            }
        }
        Ok(())
    }

    fn build_meta(&self, header: &Header, pending: PendingExtensions, size: u64) -> EntryMeta {
        let entry_type = header.entry_type();
        let kind = if entry_type.is_file() || entry_type.is_contiguous() {
            EntryKind::File
        } else if entry_type.is_dir() {
            EntryKind::Directory
        } else if entry_type.is_symlink() {
            EntryKind::Symlink
        } else if entry_type.is_hard_link() {
            EntryKind::HardLink
        } else {
            EntryKind::Other
        };

        let path = match pending.path {
            Some(bytes) => lossy(&bytes),
            None => lossy(&header.path_bytes()),
        };
        let link_target = match pending.link_target {
            Some(bytes) => Some(lossy(&bytes)),
            None => header.link_name_bytes().map(|bytes| lossy(&bytes)),
        };
        let mtime = pending.mtime.or_else(|| header_mtime(header));

        EntryMeta {
            index: self.next_index,
            path,
            size: Some(size),
            mtime,
            kind,
            mode: header.mode().ok(),
            link_target: link_target.filter(|_| {
                matches!(kind, EntryKind::Symlink | EntryKind::HardLink)
            }),
        }
    }

    fn corrupt(&self, reason: String) -> Error {
        let (entry_index, entry_name) = match &self.current {
            Some(current) => (Some(current.index), Some(current.path.clone())),
            None => (Some(self.next_index), None),
        };
        Error::Corrupt {
            entry_index,
            entry_name,
            reason,
        }
    }

    /// Classifies an error raised by the decompressor or the file.
    fn stream_error(&self, e: io::Error) -> Error {
        match e.kind() {
            io::ErrorKind::InvalidData | io::ErrorKind::InvalidInput => self.corrupt(format!(
                "invalid {} data at offset {}: {}",
                self.compression, self.position, e
            )),
            io::ErrorKind::UnexpectedEof => {
                self.corrupt(format!("{} stream ends unexpectedly: {}", self.compression, e))
            }
            _ => Error::Io(e),
        }
    }
}

impl DecoderBinding for TarDecoder {
    fn open_container(path: &Path, config: &SessionConfig) -> Result<Self> {
        let file = File::open(path).map_err(|e| open_error(path, e))?;
        let mut reader = BufReader::with_capacity(config.io_buffer_size, file);

        let prefix = reader.fill_buf().map_err(|e| open_error(path, e))?;
        if prefix.is_empty() {
            return Err(unsupported(path, "file is empty"));
        }
        let compression = Compression::detect(prefix);
        if !compression.is_enabled() {
            return Err(unsupported(
                path,
                format!("{} compression is not supported by this build", compression),
            ));
        }
        log::debug!("opening {} ({} compression)", path.display(), compression);

        let inner = compression
            .wrap(reader)
            .map_err(|e| unsupported(path, format!("{} stream rejected: {}", compression, e)))?;
        let mut decoder = Self {
            reader: inner,
            compression,
            first_block: None,
            current: None,
            padding: 0,
            next_index: 0,
            position: 0,
            verify_checksums: config.verify_checksums,
            finished: false,
        };

        // The first block decides whether this is a tar stream at all.
        let mut header = Header::new_old();
        match decoder.read_block(header.as_mut_bytes()) {
            Ok(Block::Full) => {}
            Ok(Block::Eof) | Ok(Block::Partial(_)) => {
                return Err(unsupported(path, "too short to hold a tar header"));
            }
            Err(e) => match e.kind() {
                io::ErrorKind::InvalidData
                | io::ErrorKind::InvalidInput
                | io::ErrorKind::UnexpectedEof => {
                    return Err(unsupported(
                        path,
                        format!("invalid {} stream: {}", compression, e),
                    ));
                }
                _ => return Err(open_error(path, e)),
            },
        }
        if !is_zero_block(&header) && !checksum_matches(&header) {
            return Err(unsupported(path, "first block is not a tar header"));
        }
        decoder.first_block = Some(header);
        Ok(decoder)
    }

    fn next_entry(&mut self) -> Result<Option<EntryMeta>> {
        if self.finished {
            return Ok(None);
        }
        self.finish_current()?;
        if self.finished {
            return Ok(None);
        }

        let mut pending = PendingExtensions::default();
        loop {
            let header = match self.next_header()? {
                Some(header) => header,
                None => {
                    self.finished = true;
                    return Ok(None);
                }
            };
            if is_zero_block(&header) {
                log::debug!("end-of-archive marker at offset {}", self.position);
                self.finished = true;
                return Ok(None);
            }
            if self.verify_checksums && !checksum_matches(&header) {
                return Err(self.corrupt(format!(
                    "header checksum mismatch at offset {}",
                    self.position - BLOCK_SIZE
                )));
            }

            let header_size = header
                .entry_size()
                .map_err(|e| self.corrupt(format!("invalid size field: {}", e)))?;
            let entry_type = header.entry_type();

            if entry_type.is_gnu_longname() {
                let mut name = self.read_extension(header_size)?;
                trim_nuls(&mut name);
                pending.path = Some(name);
                continue;
            }
            if entry_type.is_gnu_longlink() {
                let mut target = self.read_extension(header_size)?;
                trim_nuls(&mut target);
                pending.link_target = Some(target);
                continue;
            }
            if entry_type.is_pax_local_extensions() {
                let data = self.read_extension(header_size)?;
                self.apply_pax(&data, &mut pending)?;
                continue;
            }
            if entry_type.is_pax_global_extensions() {
                // Global records are not applied; matches tar-rs.
                self.read_extension(header_size)?;
                continue;
            }
            if entry_type.is_gnu_sparse() {
                return Err(Error::UnsupportedFeature {
                    feature: "GNU sparse entries",
                });
            }

            let size = pending.size.unwrap_or(header_size);
            let meta = self.build_meta(&header, pending, size);
            log::trace!(
                "entry {} '{}' ({} bytes) at offset {}",
                meta.index,
                meta.path,
                size,
                self.position
            );

            self.current = Some(CurrentEntry {
                index: meta.index,
                path: meta.path.clone(),
                size,
                remaining: size,
            });
            self.padding = padding_for(size);
            self.next_index += 1;
            return Ok(Some(meta));
        }
    }

    fn read_entry_chunk(&mut self, dest: &mut [u8]) -> Result<usize> {
        let remaining = match &self.current {
            Some(current) => current.remaining,
            None => return Ok(0),
        };
        if remaining == 0 || dest.is_empty() {
            return Ok(0);
        }

        // Fill as much as the payload allows so chunk boundaries do not
        // depend on how the decompressor splits its output.
        let want = dest.len().min(usize::try_from(remaining).unwrap_or(usize::MAX));
        let mut filled = 0;
        while filled < want {
            match self.reader.read(&mut dest[filled..want]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(self.stream_error(e)),
            }
        }
        self.position += filled as u64;

        let Some(current) = self.current.as_mut() else {
            return Ok(0);
        };
        current.remaining -= filled as u64;
        if filled == 0 {
            return Err(Error::Truncated {
                entry_index: current.index,
                entry_name: Some(current.path.clone()),
                expected: current.size,
                actual: current.size - current.remaining,
            });
        }
        Ok(filled)
    }
}

fn open_error(path: &Path, e: io::Error) -> Error {
    if e.kind() == io::ErrorKind::NotFound {
        Error::NotFound {
            path: path.to_path_buf(),
        }
    } else {
        Error::Open {
            path: path.to_path_buf(),
            source: e,
        }
    }
}

fn unsupported(path: &Path, reason: impl Into<String>) -> Error {
    Error::UnsupportedFormat {
        path: PathBuf::from(path),
        reason: reason.into(),
    }
}

fn padding_for(size: u64) -> u64 {
    (BLOCK_SIZE - size % BLOCK_SIZE) % BLOCK_SIZE
}

/// Reads the header mtime; base-256 values past `i64::MAX` count as absent.
fn header_mtime(header: &Header) -> Option<Timestamp> {
    let secs = header.mtime().ok()?;
    i64::try_from(secs).ok().map(Timestamp::from_unix_secs)
}

fn is_zero_block(header: &Header) -> bool {
    header.as_bytes().iter().all(|&b| b == 0)
}

/// Checks the header checksum, accepting both the unsigned sum and the
/// signed sum some historic writers produced.
fn checksum_matches(header: &Header) -> bool {
    let Ok(stored) = header.cksum() else {
        return false;
    };
    let mut unsigned: u32 = 0;
    let mut signed: i32 = 0;
    for (i, &b) in header.as_bytes().iter().enumerate() {
        // The checksum field itself counts as spaces.
        let b = if (148..156).contains(&i) { b' ' } else { b };
        unsigned += b as u32;
        signed += (b as i8) as i32;
    }
    stored == unsigned || stored as i32 == signed
}

fn trim_nuls(bytes: &mut Vec<u8>) {
    while bytes.last() == Some(&0) {
        bytes.pop();
    }
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}
