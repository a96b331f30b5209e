//! Integration tests for listener-driven runs.

#![cfg(feature = "gzip")]

mod common;

use std::path::{Path, PathBuf};

use common::{as_refs, three_entries};
use unarchive::{
    ArchiveSession, Entry, EntryAction, Error, ErrorCategory, Result, SessionListener,
    SessionState,
};

#[derive(Default)]
struct Collect {
    ready: Option<PathBuf>,
    files: Vec<(String, Vec<u8>)>,
    ends: Vec<(usize, u64)>,
    exhausted: Option<usize>,
    errors: Vec<ErrorCategory>,
    skip_suffix: Option<&'static str>,
}

impl SessionListener for Collect {
    fn on_ready(&mut self, path: &Path) {
        self.ready = Some(path.to_path_buf());
    }

    fn on_entry(&mut self, entry: &Entry) -> EntryAction {
        if let Some(suffix) = self.skip_suffix {
            if entry.path().ends_with(suffix) {
                return EntryAction::Skip;
            }
        }
        self.files.push((entry.path().to_string(), Vec::new()));
        EntryAction::Read
    }

    fn on_data(&mut self, _entry: &Entry, chunk: &[u8]) -> Result<()> {
        if let Some((_, data)) = self.files.last_mut() {
            data.extend_from_slice(chunk);
        }
        Ok(())
    }

    fn on_entry_end(&mut self, entry: &Entry, bytes: u64) {
        self.ends.push((entry.index(), bytes));
    }

    fn on_exhausted(&mut self, entries: usize) {
        self.exhausted = Some(entries);
    }

    fn on_error(&mut self, error: &Error) {
        self.errors.push(error.category());
    }
}

#[tokio::test]
async fn test_run_collects_every_entry() {
    let entries = three_entries();
    let fixture = common::tar_gz(&as_refs(&entries));

    let mut listener = Collect::default();
    let mut buf = vec![0u8; 1024];
    let mut session = ArchiveSession::new();
    let summary = session
        .run(fixture.path(), &mut listener, &mut buf)
        .await
        .unwrap();

    assert_eq!(summary.entries, 3);
    assert_eq!(summary.skipped, 0);
    assert_eq!(summary.bytes, 4106);
    assert_eq!(listener.ready.as_deref(), Some(fixture.path()));
    assert_eq!(listener.files, entries);
    assert_eq!(listener.ends, vec![(0, 0), (1, 10), (2, 4096)]);
    assert_eq!(listener.exhausted, Some(3));
    assert!(listener.errors.is_empty());
    assert_eq!(session.state(), SessionState::Exhausted);
}

#[tokio::test]
async fn test_run_skips_on_request() {
    let entries = three_entries();
    let fixture = common::tar_gz(&as_refs(&entries));

    let mut listener = Collect {
        skip_suffix: Some(".bin"),
        ..Collect::default()
    };
    let mut buf = vec![0u8; 512];
    let summary = ArchiveSession::new()
        .run(fixture.path(), &mut listener, &mut buf)
        .await
        .unwrap();

    assert_eq!(summary.entries, 3);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.bytes, 10);
    assert_eq!(listener.files.len(), 2);
    assert_eq!(listener.ends, vec![(0, 0), (1, 10)]);
}

#[tokio::test]
async fn test_run_reports_open_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut listener = Collect::default();
    let err = ArchiveSession::new()
        .run(dir.path().join("missing.tgz"), &mut listener, &mut [0u8; 64])
        .await
        .unwrap_err();

    assert!(err.is_open_error());
    assert!(listener.ready.is_none());
    assert_eq!(listener.errors, vec![ErrorCategory::Open]);
    assert!(listener.exhausted.is_none());
}

#[tokio::test]
async fn test_listener_error_stops_run() {
    struct Refuse;

    impl SessionListener for Refuse {
        fn on_data(&mut self, entry: &Entry, _chunk: &[u8]) -> Result<()> {
            Err(Error::ResourceLimitExceeded(format!(
                "{} is too much",
                entry.path()
            )))
        }
    }

    let entries = three_entries();
    let fixture = common::tar_gz(&as_refs(&entries));
    let err = ArchiveSession::new()
        .run(fixture.path(), &mut Refuse, &mut [0u8; 64])
        .await
        .unwrap_err();
    assert!(err.to_string().contains("small.txt"), "{}", err);
}
