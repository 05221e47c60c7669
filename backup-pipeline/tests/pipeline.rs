//! End-to-end runs of the backup pipeline against an in-memory remote store.

mod common;

use backup_pipeline::executor::manifest::{parse_manifest_line, FileDigest, Md5Digest, MANIFEST_FILE_NAME};
use backup_pipeline::executor::{Pipeline, RunContext};
use backup_pipeline::utils::errors::MirrorOp;
use backup_pipeline::{run_backup, BackupError};
use chrono::NaiveDate;
use common::{zip_entries, MemorySession};
use md5::{Digest, Md5};
use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::Path;
use tempfile::TempDir;

const ROOT: &str = "/srv/data";

fn context(output: &Path) -> RunContext {
    RunContext::for_date(NaiveDate::from_ymd_opt(2024, 3, 9).unwrap(), output)
}

fn md5_hex(data: &[u8]) -> String {
    hex::encode(Md5::digest(data))
}

fn manifest_records(text: &str) -> Vec<(String, String)> {
    text.lines()
        .map(|l| {
            let (p, d) = parse_manifest_line(l).expect("well-formed manifest line");
            (p.to_string(), d.to_string())
        })
        .collect()
}

#[test]
fn test_logs_and_b_txt_scenario() {
    let mut session = MemorySession::with_root(ROOT);
    let logs = session.add_dir(ROOT, "logs");
    session.add_file(&logs, "a.txt", b"hello");
    session.add_file(ROOT, "b.txt", b"world");

    let temp_dir = TempDir::new().unwrap();
    let ctx = context(temp_dir.path());

    let report = run_backup(&session, &ctx, ROOT).unwrap();

    assert_eq!(report.files_mirrored, 2);
    assert_eq!(report.manifest_records, 2);
    assert_eq!(report.archive_entries, 4);
    assert!(report.cleaned_up);
    assert_eq!(report.archive_path, temp_dir.path().join("20240309.zip"));
    assert!(!ctx.work_dir().exists());

    let entries = zip_entries(&ctx.archive_path());
    let names: Vec<&str> = entries.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, ["b.txt", "logs/", "logs/a.txt", "md5.txt"]);
    assert_eq!(entries[0].1, b"world");
    assert_eq!(entries[2].1, b"hello");

    let manifest = String::from_utf8(entries[3].1.clone()).unwrap();
    assert_eq!(
        manifest_records(&manifest),
        [
            ("b.txt".to_string(), md5_hex(b"world")),
            ("logs/a.txt".to_string(), md5_hex(b"hello")),
        ]
    );
    for line in manifest.lines() {
        let (_, digest) = parse_manifest_line(line).unwrap();
        assert_eq!(digest.len(), 32);
        assert!(line.len() >= 40 + 1 + 32);
    }
}

#[test]
fn test_archive_matches_remote_tree() {
    let mut session = MemorySession::with_root(ROOT);
    // Listing order deliberately not alphabetical.
    session.add_file(ROOT, "zeta.bin", &[0u8, 1, 2, 255]);
    let nested = session.add_dir(ROOT, "alpha");
    let deeper = session.add_dir(&nested, "beta");
    session.add_file(&deeper, "gamma.txt", b"deep content");
    session.add_file(&nested, "mid.txt", b"");
    session.add_dir(ROOT, "empty");

    let temp_dir = TempDir::new().unwrap();
    let ctx = context(temp_dir.path());
    run_backup(&session, &ctx, ROOT).unwrap();

    let entries = zip_entries(&ctx.archive_path());
    let files: BTreeSet<&str> = entries
        .iter()
        .map(|(n, _)| n.as_str())
        .filter(|n| !n.ends_with('/'))
        .collect();
    let dirs: BTreeSet<&str> = entries
        .iter()
        .map(|(n, _)| n.as_str())
        .filter(|n| n.ends_with('/'))
        .collect();

    assert_eq!(
        files,
        BTreeSet::from(["zeta.bin", "alpha/beta/gamma.txt", "alpha/mid.txt", MANIFEST_FILE_NAME])
    );
    assert_eq!(dirs, BTreeSet::from(["alpha/", "alpha/beta/", "empty/"]));

    let content = |name: &str| entries.iter().find(|(n, _)| n == name).unwrap().1.clone();
    assert_eq!(content("zeta.bin"), [0u8, 1, 2, 255]);
    assert_eq!(content("alpha/beta/gamma.txt"), b"deep content");
    assert!(content("alpha/mid.txt").is_empty());

    let manifest = String::from_utf8(content(MANIFEST_FILE_NAME)).unwrap();
    let records = manifest_records(&manifest);
    assert_eq!(records.len(), 3);
    for (path, digest) in records {
        assert_eq!(digest, md5_hex(&content(&path)));
    }
}

#[test]
fn test_empty_remote_tree() {
    let session = MemorySession::with_root(ROOT);
    let temp_dir = TempDir::new().unwrap();
    let ctx = context(temp_dir.path());

    let report = run_backup(&session, &ctx, ROOT).unwrap();

    assert_eq!(report.files_mirrored, 0);
    assert_eq!(report.manifest_records, 0);
    let entries = zip_entries(&ctx.archive_path());
    assert_eq!(entries, [(MANIFEST_FILE_NAME.to_string(), Vec::new())]);
}

/// Fails for one file name, MD5 otherwise.
struct FailFor(&'static str);

impl FileDigest for FailFor {
    fn digest_file(&self, path: &Path) -> io::Result<String> {
        if path.ends_with(self.0) {
            return Err(io::Error::new(io::ErrorKind::Other, "digest unavailable"));
        }
        Md5Digest.digest_file(path)
    }
}

#[test]
fn test_failed_digest_still_archived() {
    let mut session = MemorySession::with_root(ROOT);
    session.add_file(ROOT, "good1", b"one");
    session.add_file(ROOT, "bad", b"original bytes");
    session.add_file(ROOT, "good2", b"two");

    let temp_dir = TempDir::new().unwrap();
    let ctx = context(temp_dir.path());

    let report = Pipeline::new()
        .with_digest(&FailFor("bad"))
        .run(&session, &ctx, ROOT)
        .unwrap();

    assert_eq!(report.manifest_records, 2);
    assert_eq!(report.digests_skipped, 1);

    let entries = zip_entries(&ctx.archive_path());
    let bad = entries.iter().find(|(n, _)| n == "bad").expect("bad archived");
    assert_eq!(bad.1, b"original bytes");

    let manifest = entries.iter().find(|(n, _)| n == MANIFEST_FILE_NAME).unwrap();
    let paths: Vec<String> = manifest_records(std::str::from_utf8(&manifest.1).unwrap())
        .into_iter()
        .map(|(p, _)| p)
        .collect();
    assert_eq!(paths, ["good1", "good2"]);
}

fn refuse_cleanup(work_dir: &Path) -> backup_pipeline::Result<()> {
    Err(BackupError::Cleanup {
        path: work_dir.display().to_string(),
        source: io::Error::new(io::ErrorKind::PermissionDenied, "directory busy"),
    })
}

#[test]
fn test_cleanup_failure_still_succeeds() {
    let mut session = MemorySession::with_root(ROOT);
    session.add_file(ROOT, "a.txt", b"kept");

    let temp_dir = TempDir::new().unwrap();
    let ctx = context(temp_dir.path());

    let report = Pipeline::new()
        .with_cleanup(refuse_cleanup)
        .run(&session, &ctx, ROOT)
        .unwrap();

    assert!(!report.cleaned_up);
    assert_eq!(report.files_mirrored, 1);
    assert!(ctx.archive_path().exists());
    assert!(ctx.work_dir().join("a.txt").exists());

    let entries = zip_entries(&ctx.archive_path());
    let names: Vec<&str> = entries.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, ["a.txt", "md5.txt"]);
}

#[test]
fn test_mid_mirror_failure_produces_no_archive() {
    let mut session = MemorySession::with_root(ROOT);
    session.add_file(ROOT, "first.txt", b"copied");
    let broken = session.add_file(ROOT, "second.txt", b"never arrives");
    session.add_file(ROOT, "third.txt", b"not reached");
    session.break_file(&broken);

    let temp_dir = TempDir::new().unwrap();
    let ctx = context(temp_dir.path());

    let err = run_backup(&session, &ctx, ROOT).unwrap_err();

    match err {
        BackupError::Mirror { op, path, source } => {
            assert_eq!(op, MirrorOp::Copy);
            assert_eq!(path, "/srv/data/second.txt");
            assert_eq!(source.kind(), io::ErrorKind::ConnectionReset);
        }
        other => panic!("unexpected error: {other}"),
    }

    // Partial state is left behind, nothing downstream ran.
    assert!(ctx.work_dir().join("first.txt").exists());
    assert!(!ctx.work_dir().join("third.txt").exists());
    assert!(!ctx.manifest_path().exists());
    assert!(!ctx.archive_path().exists());
}

#[test]
fn test_missing_remote_root() {
    let session = MemorySession::with_root("/elsewhere");
    let temp_dir = TempDir::new().unwrap();
    let ctx = context(temp_dir.path());

    let err = run_backup(&session, &ctx, ROOT).unwrap_err();

    assert!(matches!(err, BackupError::Mirror { op: MirrorOp::ListDir, .. }));
    assert!(!ctx.archive_path().exists());
}

#[test]
fn test_symlinks_are_not_mirrored() {
    let mut session = MemorySession::with_root(ROOT);
    session.add_symlink(ROOT, "loop");
    session.add_file(ROOT, "real.txt", b"data");

    let temp_dir = TempDir::new().unwrap();
    let ctx = context(temp_dir.path());

    let report = run_backup(&session, &ctx, ROOT).unwrap();

    assert_eq!(report.entries_skipped, 1);
    let names: Vec<String> = zip_entries(&ctx.archive_path()).into_iter().map(|(n, _)| n).collect();
    assert_eq!(names, ["md5.txt", "real.txt"]);
}

#[test]
fn test_stale_work_dir_content_is_archived() {
    // A leftover directory from an earlier run on the same date is not cleared.
    let session = MemorySession::with_root(ROOT);
    let temp_dir = TempDir::new().unwrap();
    let ctx = context(temp_dir.path());
    fs::create_dir_all(ctx.work_dir()).unwrap();
    fs::write(ctx.work_dir().join("stale.txt"), b"old").unwrap();

    let report = run_backup(&session, &ctx, ROOT).unwrap();

    assert_eq!(report.manifest_records, 1);
    let names: Vec<String> = zip_entries(&ctx.archive_path()).into_iter().map(|(n, _)| n).collect();
    assert_eq!(names, ["md5.txt", "stale.txt"]);
}
