//! The chunked read loop.
//!
//! These helpers drive [`Entry::read`] until the payload signals its end,
//! handing each filled prefix of one caller-supplied buffer to a consumer.
//! The same buffer can be reused for every entry of a session.
//!
//! # Example
//!
//! ```rust,no_run
//! use unarchive::{ArchiveSession, Result, read_loop};
//!
//! # async fn demo() -> Result<()> {
//! let mut session = ArchiveSession::open_path("logs.tar.gz").await?;
//! let mut buf = vec![0u8; 16 * 1024];
//! let mut lines = 0;
//!
//! while let Some(entry) = session.advance().await? {
//!     let stats = read_loop::read_chunks(&entry, &mut buf, |chunk| {
//!         lines += chunk.iter().filter(|&&b| b == b'\n').count();
//!         Ok(())
//!     })
//!     .await?;
//!     println!("{}: {} bytes in {} chunks", entry.path(), stats.bytes, stats.chunks);
//! }
//! # Ok(())
//! # }
//! ```

use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::{Entry, Error, Result};

/// Counters for one run of the read loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChunkStats {
    /// Calls to [`Entry::read`], including the final one returning 0.
    pub reads: usize,
    /// Non-empty chunks handed to the consumer.
    pub chunks: usize,
    /// Total payload bytes.
    pub bytes: u64,
}

/// Reads `entry` to its end, passing every chunk to `on_chunk`.
///
/// A chunk is `&buf[..n]` and is only valid during the callback. A
/// zero-size entry produces one read and no chunk.
///
/// # Errors
///
/// Stops at the first error from [`Entry::read`] or from `on_chunk` and
/// returns it; chunks delivered before the error stay delivered. Nothing is
/// retried.
pub async fn read_chunks<F>(entry: &Entry, buf: &mut [u8], mut on_chunk: F) -> Result<ChunkStats>
where
    F: FnMut(&[u8]) -> Result<()>,
{
    let mut stats = ChunkStats::default();
    loop {
        let n = entry.read(buf).await?;
        stats.reads += 1;
        if n == 0 {
            return Ok(stats);
        }
        stats.chunks += 1;
        stats.bytes += n as u64;
        on_chunk(&buf[..n])?;
    }
}

/// Reads the whole payload of `entry` into memory.
pub async fn read_to_vec(entry: &Entry, buf: &mut [u8]) -> Result<Vec<u8>> {
    // Declared sizes come from the archive; don't trust them for more than a hint.
    let hint = entry.size().min(buf.len() as u64 * 64) as usize;
    let mut data = Vec::with_capacity(hint);
    read_chunks(entry, buf, |chunk| {
        data.extend_from_slice(chunk);
        Ok(())
    })
    .await?;
    Ok(data)
}

/// Copies the payload of `entry` into an async writer.
///
/// Returns the number of bytes written. The writer is flushed at the end.
///
/// # Errors
///
/// Read errors are returned unchanged; write errors as [`Error::Io`].
pub async fn copy_to_writer<W>(entry: &Entry, buf: &mut [u8], writer: &mut W) -> Result<u64>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut total_written = 0u64;
    loop {
        let n = entry.read(buf).await?;
        if n == 0 {
            break;
        }
        writer.write_all(&buf[..n]).await.map_err(Error::Io)?;
        total_written += n as u64;
    }
    writer.flush().await.map_err(Error::Io)?;
    Ok(total_written)
}

/// Reads and discards the rest of `entry`, returning the bytes skipped.
pub async fn skip(entry: &Entry, buf: &mut [u8]) -> Result<u64> {
    let stats = read_chunks(entry, buf, |_| Ok(())).await?;
    log::trace!("skipped {} bytes of entry {}", stats.bytes, entry.index());
    Ok(stats.bytes)
}
