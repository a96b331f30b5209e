//! Property-based tests using proptest.
//!
//! For arbitrary entry sizes and read buffer sizes, a session must deliver
//! every entry in order, with chunk sizes bounded by the buffer and payload
//! sums matching the declared sizes.

#![cfg(feature = "gzip")]

mod common;

use proptest::prelude::*;
use unarchive::{ArchiveSession, UsageError};

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("build runtime")
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn chunked_reads_reassemble_payloads(
        sizes in prop::collection::vec(0usize..5000, 0..5),
        buf_len in 1usize..3000,
    ) {
        let owned: Vec<(String, Vec<u8>)> = sizes
            .iter()
            .enumerate()
            .map(|(i, &len)| (format!("entry-{}.bin", i), common::payload(len, i as u8)))
            .collect();
        let fixture = common::tar_gz(&common::as_refs(&owned));

        runtime().block_on(async {
            let mut session = ArchiveSession::open_path(fixture.path()).await.unwrap();
            let mut buf = vec![0u8; buf_len];

            for (name, data) in &owned {
                let entry = session.advance().await.unwrap().expect("entry present");
                prop_assert_eq!(entry.path(), name.as_str());
                prop_assert_eq!(entry.size(), data.len() as u64);

                let mut received = Vec::new();
                loop {
                    let n = entry.read(&mut buf).await.unwrap();
                    prop_assert!(n <= buf_len);
                    if n == 0 {
                        break;
                    }
                    received.extend_from_slice(&buf[..n]);
                }
                prop_assert_eq!(&received, data);

                let err = entry.read(&mut buf).await.unwrap_err();
                prop_assert_eq!(err.usage(), Some(UsageError::EntryConsumed));
            }

            prop_assert!(session.advance().await.unwrap().is_none());
            prop_assert_eq!(session.entries_seen(), owned.len());
            Ok(())
        })?;
    }

    #[test]
    fn every_read_but_the_last_fills_the_buffer(
        len in 0usize..20_000,
        buf_len in 1usize..4096,
    ) {
        let data = common::payload(len, 0);
        let fixture = common::tar_gz(&[("one.bin", data.as_slice())]);

        runtime().block_on(async {
            let mut session = ArchiveSession::open_path(fixture.path()).await.unwrap();
            let entry = session.advance().await.unwrap().unwrap();
            let mut buf = vec![0u8; buf_len];

            let mut reads = Vec::new();
            loop {
                let n = entry.read(&mut buf).await.unwrap();
                reads.push(n);
                if n == 0 {
                    break;
                }
            }

            let expected_full = len / buf_len;
            let tail = len % buf_len;
            let expected_reads = expected_full + usize::from(tail > 0) + 1;
            prop_assert_eq!(reads.len(), expected_reads);
            prop_assert!(reads[..expected_full].iter().all(|&n| n == buf_len));
            prop_assert_eq!(reads.iter().sum::<usize>(), len);
            Ok(())
        })?;
    }
}
