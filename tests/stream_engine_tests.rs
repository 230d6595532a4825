//! Stream Engine Tests
//!
//! Exact wire sequences of the stream protocols, driven through a scripted
//! transport.

mod common;

use std::fs;

use common::ScriptedTransport;
use tempfile::TempDir;
use tinyftp::engine::{stream, DeleteOutcome, RetrieveOutcome, Served};
use tinyftp::error::FtpError;
use tinyftp::protocol::{encode_int32, encode_short, DirectoryListing, TransferMetrics};

const ACK: &[u8] = b"1";

fn setup_temp_dir_with(files: &[(&str, &str)]) -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    for (name, contents) in files {
        fs::write(temp_dir.path().join(name), contents).unwrap();
    }
    temp_dir
}

fn never_asked(_: &str) -> bool {
    panic!("confirmation requested for a file the server does not have")
}

// =============================================================================
// Store Tests
// =============================================================================

#[test]
fn test_issue_store_wire_sequence() {
    let local = setup_temp_dir_with(&[("abc", "0123456789")]);
    let mut t = ScriptedTransport::stream(4);
    t.push(ACK).push(ACK).push_float32(0.5).push_int32(10);

    let metrics = stream::issue_store(&mut t, &local.path().join("abc"), "abc").unwrap();

    assert_eq!(metrics, TransferMetrics::new(0.5, 10));
    assert_eq!(
        t.sent,
        vec![
            b"STOR".to_vec(),
            encode_short(3).to_vec(),
            b"abc".to_vec(),
            encode_int32(10).to_vec(),
            b"0123".to_vec(),
            b"4567".to_vec(),
            b"89".to_vec(),
        ]
    );
    assert!(t.is_drained());
}

#[test]
fn test_issue_store_missing_local_file_sends_nothing() {
    let local = TempDir::new().unwrap();
    let mut t = ScriptedTransport::stream(4);

    let err = stream::issue_store(&mut t, &local.path().join("nope"), "nope").unwrap_err();

    assert!(matches!(err, FtpError::LocalIo { .. }));
    assert!(!err.is_session_fatal());
    assert!(t.sent.is_empty());
}

#[test]
fn test_respond_store_writes_file_and_reports_metrics() {
    let root = TempDir::new().unwrap();
    let mut t = ScriptedTransport::stream(4);
    t.push_name("abc").push_int32(10).push(b"0123456789");

    let served = stream::respond_store(&mut t, root.path()).unwrap();

    match served {
        Served::Stored { name, metrics } => {
            assert_eq!(name, "abc");
            assert_eq!(metrics.byte_count, 10);
            assert!(metrics.elapsed_seconds >= 0.0);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(fs::read(root.path().join("abc")).unwrap(), b"0123456789");
    assert_eq!(t.sent.len(), 4);
    assert_eq!(t.sent[0], ACK);
    assert_eq!(t.sent[1], ACK);
    assert_eq!(t.sent[3], encode_int32(10));
}

#[test]
fn test_respond_store_zero_length_file_still_sends_metrics() {
    let root = TempDir::new().unwrap();
    let mut t = ScriptedTransport::stream(4);
    t.push_name("empty").push_int32(0);

    stream::respond_store(&mut t, root.path()).unwrap();

    assert_eq!(fs::read(root.path().join("empty")).unwrap().len(), 0);
    assert_eq!(t.sent.len(), 4);
    assert_eq!(t.sent[3], encode_int32(0));
}

#[test]
fn test_respond_store_drains_payload_for_unsafe_name() {
    let root = TempDir::new().unwrap();
    let mut t = ScriptedTransport::stream(4);
    t.push_name("../escape").push_int32(6).push(b"secret");

    let err = stream::respond_store(&mut t, root.path()).unwrap_err();

    assert!(matches!(err, FtpError::InvalidFilename(_)));
    assert!(!err.is_session_fatal());
    assert!(t.is_drained());
    assert_eq!(t.sent.len(), 4);
    assert!(!root.path().join("../escape").exists());
}

// =============================================================================
// Retrieve Tests
// =============================================================================

#[test]
fn test_respond_retrieve_missing_sends_only_sentinel() {
    let root = TempDir::new().unwrap();
    let mut t = ScriptedTransport::stream(4);
    t.push_name("missing.txt");

    let served = stream::respond_retrieve(&mut t, root.path()).unwrap();

    assert_eq!(
        served,
        Served::NotFound {
            name: "missing.txt".to_string()
        }
    );
    assert_eq!(t.sent, vec![ACK.to_vec(), encode_int32(-1).to_vec()]);
}

#[test]
fn test_issue_retrieve_missing_skips_payload() {
    let local = TempDir::new().unwrap();
    let dest = local.path().join("missing.txt");
    let mut t = ScriptedTransport::stream(4);
    t.push(ACK).push_int32(-1);

    let outcome = stream::issue_retrieve(&mut t, "missing.txt", &dest).unwrap();

    assert_eq!(outcome, RetrieveOutcome::NotFound);
    assert!(!dest.exists());
    assert_eq!(
        t.sent,
        vec![
            b"RETR".to_vec(),
            encode_short(11).to_vec(),
            b"missing.txt".to_vec()
        ]
    );
    assert!(t.is_drained());
}

#[test]
fn test_issue_retrieve_existing() {
    let local = TempDir::new().unwrap();
    let dest = local.path().join("hello.txt");
    let mut t = ScriptedTransport::stream(4);
    t.push(ACK).push_int32(5).push(b"hello").push_float32(0.25);

    let outcome = stream::issue_retrieve(&mut t, "hello.txt", &dest).unwrap();

    assert_eq!(
        outcome,
        RetrieveOutcome::Retrieved(TransferMetrics::new(0.25, 5))
    );
    assert_eq!(fs::read(&dest).unwrap(), b"hello");
    assert_eq!(&t.sent[3..], &[ACK.to_vec(), ACK.to_vec()]);
    assert!(t.is_drained());
}

#[test]
fn test_respond_retrieve_streams_chunks() {
    let root = setup_temp_dir_with(&[("data", "0123456789")]);
    let mut t = ScriptedTransport::stream(4);
    t.push_name("data").push(ACK).push(ACK);

    let served = stream::respond_retrieve(&mut t, root.path()).unwrap();

    assert!(matches!(served, Served::Retrieved { ref name, .. } if name == "data"));
    assert_eq!(t.sent[1], encode_int32(10));
    assert_eq!(
        &t.sent[2..5],
        &[b"0123".to_vec(), b"4567".to_vec(), b"89".to_vec()]
    );
    assert_eq!(t.sent.len(), 6);
}

#[test]
fn test_respond_retrieve_directory_is_not_found() {
    let root = TempDir::new().unwrap();
    fs::create_dir(root.path().join("sub")).unwrap();
    let mut t = ScriptedTransport::stream(4);
    t.push_name("sub");

    let served = stream::respond_retrieve(&mut t, root.path()).unwrap();

    assert!(matches!(served, Served::NotFound { .. }));
    assert_eq!(t.sent[1], encode_int32(-1));
}

// =============================================================================
// Delete Tests
// =============================================================================

#[test]
fn test_issue_delete_declined() {
    let mut t = ScriptedTransport::stream(4);
    t.push(ACK).push_int32(1).push_float32(0.1);
    let mut asked = Vec::new();
    let mut decline = |name: &str| {
        asked.push(name.to_string());
        false
    };

    let outcome = stream::issue_delete(&mut t, "keep.txt", &mut decline).unwrap();

    assert_eq!(
        outcome,
        DeleteOutcome::Abandoned(Some(TransferMetrics::new(0.1, 0)))
    );
    assert_eq!(asked, ["keep.txt"]);
    assert_eq!(&t.sent[3..], &[b"N".to_vec(), ACK.to_vec()]);
    assert!(t.is_drained());
}

#[test]
fn test_issue_delete_confirmed() {
    let mut t = ScriptedTransport::stream(4);
    t.push(ACK).push_int32(1).push_int32(1).push_float32(0.1);

    let outcome = stream::issue_delete(&mut t, "gone.txt", &mut |_: &str| true).unwrap();

    assert!(matches!(outcome, DeleteOutcome::Deleted(_)));
    assert_eq!(&t.sent[3..], &[b"Y".to_vec(), ACK.to_vec()]);
}

#[test]
fn test_issue_delete_reports_server_failure() {
    let mut t = ScriptedTransport::stream(4);
    t.push(ACK).push_int32(1).push_int32(-1).push_float32(0.1);

    let outcome = stream::issue_delete(&mut t, "locked", &mut |_: &str| true).unwrap();

    assert!(matches!(outcome, DeleteOutcome::Failed(_)));
}

#[test]
fn test_issue_delete_missing_never_asks() {
    let mut t = ScriptedTransport::stream(4);
    t.push(ACK).push_int32(-1);

    let outcome = stream::issue_delete(&mut t, "nope", &mut never_asked).unwrap();

    assert_eq!(outcome, DeleteOutcome::NotFound);
    assert_eq!(t.sent.len(), 3);
}

#[test]
fn test_respond_delete_declined_keeps_file() {
    let root = setup_temp_dir_with(&[("keep.txt", "data")]);
    let mut t = ScriptedTransport::stream(4);
    t.push_name("keep.txt").push(b"N").push(ACK);

    let served = stream::respond_delete(&mut t, root.path()).unwrap();

    assert_eq!(
        served,
        Served::Abandoned {
            name: "keep.txt".to_string()
        }
    );
    assert!(root.path().join("keep.txt").exists());
    assert_eq!(t.sent.len(), 3);
    assert_eq!(t.sent[1], encode_int32(1));
    assert_eq!(t.sent[2].len(), 4);
}

#[test]
fn test_respond_delete_confirmed_removes_file() {
    let root = setup_temp_dir_with(&[("gone.txt", "data")]);
    let mut t = ScriptedTransport::stream(4);
    t.push_name("gone.txt").push(b"Y").push(ACK);

    let served = stream::respond_delete(&mut t, root.path()).unwrap();

    assert!(matches!(served, Served::Deleted { .. }));
    assert!(!root.path().join("gone.txt").exists());
    assert_eq!(t.sent[1], encode_int32(1));
    assert_eq!(t.sent[2], encode_int32(1));
    assert_eq!(t.sent.len(), 4);
}

#[test]
fn test_respond_delete_missing() {
    let root = TempDir::new().unwrap();
    let mut t = ScriptedTransport::stream(4);
    t.push_name("nope");

    let served = stream::respond_delete(&mut t, root.path()).unwrap();

    assert!(matches!(served, Served::NotFound { .. }));
    assert_eq!(t.sent, vec![ACK.to_vec(), encode_int32(-1).to_vec()]);
}

// =============================================================================
// List Tests
// =============================================================================

#[test]
fn test_respond_list_empty_directory() {
    let root = TempDir::new().unwrap();
    let mut t = ScriptedTransport::stream(4);
    t.push(ACK);

    let served = stream::respond_list(&mut t, root.path()).unwrap();

    assert_eq!(served, Served::Listed { count: 0 });
    assert_eq!(
        t.sent,
        vec![
            encode_int32(0).to_vec(),
            encode_int32(0).to_vec(),
            encode_int32(0).to_vec()
        ]
    );
}

#[test]
fn test_respond_list_paces_entries() {
    let root = setup_temp_dir_with(&[("a", "123"), ("b", "12345")]);
    let mut t = ScriptedTransport::stream(4);
    t.push(ACK).push(ACK).push(ACK);

    stream::respond_list(&mut t, root.path()).unwrap();

    assert_eq!(
        t.sent,
        vec![
            encode_int32(2).to_vec(),
            encode_int32(1).to_vec(),
            b"a".to_vec(),
            encode_int32(3).to_vec(),
            encode_int32(1).to_vec(),
            b"b".to_vec(),
            encode_int32(5).to_vec(),
            encode_int32(8).to_vec(),
            encode_int32(2).to_vec(),
        ]
    );
    assert!(t.is_drained());
}

#[test]
fn test_issue_list_empty() {
    let mut t = ScriptedTransport::stream(4);
    t.push_int32(0).push_int32(0).push_int32(0);

    let listing = stream::issue_list(&mut t).unwrap();

    assert_eq!(listing, DirectoryListing::new(Vec::new()));
    assert_eq!(t.sent, vec![b"LIST".to_vec(), ACK.to_vec()]);
}

#[test]
fn test_issue_list_acknowledges_each_entry() {
    let mut t = ScriptedTransport::stream(4);
    t.push_int32(2);
    t.push_int32(1).push(b"a").push_int32(3);
    t.push_int32(1).push(b"b").push_int32(5);
    t.push_int32(8).push_int32(2);

    let listing = stream::issue_list(&mut t).unwrap();

    assert_eq!(listing.entries().len(), 2);
    assert_eq!(listing.entries()[1].name, "b");
    assert_eq!(listing.total_size(), 8);
    assert!(listing.is_consistent());
    assert_eq!(t.sent.len(), 4);
}

// =============================================================================
// Quit Tests
// =============================================================================

#[test]
fn test_quit_exchanges_one_byte() {
    let mut responder = ScriptedTransport::stream(4);
    assert_eq!(stream::respond_quit(&mut responder).unwrap(), Served::Closed);
    assert_eq!(responder.sent_bytes().len(), 1);

    let mut issuer = ScriptedTransport::stream(4);
    issuer.push(&responder.sent_bytes());
    stream::issue_quit(&mut issuer).unwrap();
    assert_eq!(issuer.sent, vec![b"QUIT".to_vec()]);
    assert!(issuer.is_drained());
}

// =============================================================================
// Failure Tests
// =============================================================================

#[test]
fn test_reset_mid_exchange_desynchronizes() {
    let mut t = ScriptedTransport::stream(4).reset_when_drained();
    t.push_int32(3);

    let err = stream::issue_list(&mut t).unwrap_err();

    assert!(matches!(err, FtpError::Desync { operation: "list", .. }));
    assert!(err.is_session_fatal());
}

#[test]
fn test_truncated_field_is_fatal() {
    let mut t = ScriptedTransport::stream(4);
    t.push(ACK).push(&[0xff, 0xff]);

    let err = stream::issue_retrieve(&mut t, "x", &TempDir::new().unwrap().path().join("x"))
        .unwrap_err();

    assert!(matches!(err, FtpError::Framing(_)));
    assert!(err.is_session_fatal());
}

#[test]
fn test_respond_store_negative_size_leaves_existing_file() {
    let root = setup_temp_dir_with(&[("keep.txt", "precious")]);
    let mut t = ScriptedTransport::stream(4);
    t.push_name("keep.txt").push_int32(-5);

    let err = stream::respond_store(&mut t, root.path()).unwrap_err();

    assert!(matches!(err, FtpError::Framing(_)));
    assert!(err.is_session_fatal());
    assert_eq!(fs::read(root.path().join("keep.txt")).unwrap(), b"precious");
}

#[test]
fn test_issue_retrieve_negative_size_leaves_local_file() {
    let local = setup_temp_dir_with(&[("mine.txt", "local data")]);
    let dest = local.path().join("mine.txt");
    let mut t = ScriptedTransport::stream(4);
    t.push(ACK).push_int32(-7);

    let err = stream::issue_retrieve(&mut t, "mine.txt", &dest).unwrap_err();

    assert!(matches!(err, FtpError::Framing(_)));
    assert_eq!(fs::read(&dest).unwrap(), b"local data");
}

// =============================================================================
// Short Read Tests
// =============================================================================

#[test]
fn test_issue_store_with_split_fields() {
    let local = setup_temp_dir_with(&[("abc", "0123456789")]);
    for max_read in 1..=3 {
        let mut t = ScriptedTransport::stream(4).max_read(max_read);
        t.push(ACK).push(ACK).push_float32(0.5).push_int32(10);

        let metrics = stream::issue_store(&mut t, &local.path().join("abc"), "abc").unwrap();

        assert_eq!(metrics, TransferMetrics::new(0.5, 10), "max_read {max_read}");
        assert_eq!(t.sent.len(), 7);
        assert!(t.is_drained());
    }
}

#[test]
fn test_respond_store_with_split_payload() {
    for max_read in 1..=3 {
        let root = TempDir::new().unwrap();
        let mut t = ScriptedTransport::stream(4).max_read(max_read);
        t.push_name("abc").push_int32(10).push(b"0123456789");

        let served = stream::respond_store(&mut t, root.path()).unwrap();

        assert!(matches!(served, Served::Stored { ref name, .. } if name == "abc"));
        assert_eq!(fs::read(root.path().join("abc")).unwrap(), b"0123456789");
        assert_eq!(t.sent.len(), 4);
        assert!(t.is_drained());
    }
}

#[test]
fn test_issue_retrieve_with_split_fields() {
    for max_read in 1..=3 {
        let local = TempDir::new().unwrap();
        let dest = local.path().join("hello.txt");
        let mut t = ScriptedTransport::stream(4).max_read(max_read);
        t.push(ACK).push_int32(5).push(b"hello").push_float32(0.25);

        let outcome = stream::issue_retrieve(&mut t, "hello.txt", &dest).unwrap();

        assert_eq!(
            outcome,
            RetrieveOutcome::Retrieved(TransferMetrics::new(0.25, 5))
        );
        assert_eq!(fs::read(&dest).unwrap(), b"hello");
        assert!(t.is_drained());
    }
}

#[test]
fn test_delete_with_split_fields() {
    for max_read in 1..=3 {
        let mut issuer = ScriptedTransport::stream(4).max_read(max_read);
        issuer.push(ACK).push_int32(1).push_int32(1).push_float32(0.1);
        let outcome = stream::issue_delete(&mut issuer, "gone.txt", &mut |_: &str| true).unwrap();
        assert!(matches!(outcome, DeleteOutcome::Deleted(_)));
        assert!(issuer.is_drained());

        let root = setup_temp_dir_with(&[("gone.txt", "data")]);
        let mut responder = ScriptedTransport::stream(4).max_read(max_read);
        responder.push_name("gone.txt").push(b"Y").push(ACK);
        let served = stream::respond_delete(&mut responder, root.path()).unwrap();
        assert!(matches!(served, Served::Deleted { .. }));
        assert!(!root.path().join("gone.txt").exists());
    }
}

#[test]
fn test_issue_list_with_split_fields() {
    for max_read in 1..=3 {
        let mut t = ScriptedTransport::stream(4).max_read(max_read);
        t.push_int32(2);
        t.push_int32(5).push(b"a.txt").push_int32(3);
        t.push_int32(5).push(b"b.txt").push_int32(5);
        t.push_int32(8).push_int32(2);

        let listing = stream::issue_list(&mut t).unwrap();

        assert_eq!(listing.entries()[0].name, "a.txt");
        assert_eq!(listing.entries()[1].size, 5);
        assert_eq!(listing.total_size(), 8);
        assert_eq!(t.sent.len(), 4);
        assert!(t.is_drained());
    }
}
