//! The decoder worker thread.
//!
//! Each opened session runs its binding on one dedicated thread. Requests
//! arrive over a FIFO channel and every reply goes back on its own one-shot
//! channel, so replies are produced in request order. Dropping the last
//! request sender stops the thread and releases the container.

use std::io;
use std::path::PathBuf;
use std::sync::mpsc;
use std::thread;

use tokio::sync::oneshot;

use crate::binding::{DecoderBinding, EntryMeta};
use crate::{Error, Result, SessionConfig};

/// A request handled by the worker.
pub(crate) enum Request {
    /// Move to the next entry.
    Next {
        reply: oneshot::Sender<Result<Option<EntryMeta>>>,
    },
    /// Read the current entry into `scratch`; the buffer travels back with
    /// the result.
    Read {
        scratch: Vec<u8>,
        reply: oneshot::Sender<(Vec<u8>, Result<usize>)>,
    },
}

/// Request channel to a running worker.
pub(crate) type WorkerHandle = mpsc::Sender<Request>;

/// Starts a worker that opens `path` with binding `D`.
///
/// The returned receiver resolves once the container was opened (or
/// failed to open); requests sent before that are queued.
pub(crate) fn spawn<D: DecoderBinding>(
    path: PathBuf,
    config: SessionConfig,
) -> Result<(WorkerHandle, oneshot::Receiver<Result<()>>)> {
    let (requests, inbox) = mpsc::channel();
    let (opened, open_result) = oneshot::channel();
    thread::Builder::new()
        .name("archive-decoder".into())
        .spawn(move || run::<D>(path, config, opened, inbox))?;
    Ok((requests, open_result))
}

/// Error reported when the worker went away without replying.
pub(crate) fn stopped() -> Error {
    Error::Io(io::Error::other("decoder worker stopped unexpectedly"))
}

fn run<D: DecoderBinding>(
    path: PathBuf,
    config: SessionConfig,
    opened: oneshot::Sender<Result<()>>,
    inbox: mpsc::Receiver<Request>,
) {
    let mut binding = match D::open_container(&path, &config) {
        Ok(binding) => binding,
        Err(e) => {
            let _ = opened.send(Err(e));
            return;
        }
    };
    if opened.send(Ok(())).is_err() {
        log::debug!("open of {} abandoned; releasing container", path.display());
        return;
    }

    while let Ok(request) = inbox.recv() {
        match request {
            Request::Next { reply } => {
                let _ = reply.send(binding.next_entry());
            }
            Request::Read { mut scratch, reply } => {
                let result = binding.read_entry_chunk(&mut scratch);
                let _ = reply.send((scratch, result));
            }
        }
    }
    log::trace!("decoder worker for {} finished", path.display());
}
