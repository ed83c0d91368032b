//! Integration tests for cat-file sessions and the object pool.
//!
//! Every result is checked against the system git run independently.

mod common;

use std::io::Read;

use tempfile::TempDir;

use common::TestRepo;
use gitpipe::catfile::{BatchKind, BatchSession, CatFileError, ObjectPool};
use gitpipe::core::types::{ObjectId, ObjectType};
use gitpipe::gitcmd::Context;

fn pool(repo: &TestRepo) -> ObjectPool {
    ObjectPool::new(&repo.env(), &Context::background(), repo.path())
}

#[test]
fn object_info_matches_git() {
    let repo = TestRepo::new();
    let pool = pool(&repo);

    for rev in ["HEAD", "HEAD^{tree}", "HEAD:README.md"] {
        let info = pool.object_info(rev).unwrap();
        assert_eq!(info.id.as_str(), repo.rev_parse(rev), "{rev}");
        assert_eq!(info.kind.as_str(), repo.git(&["cat-file", "-t", rev]), "{rev}");
        assert_eq!(info.size.to_string(), repo.git(&["cat-file", "-s", rev]), "{rev}");
    }
    assert_eq!(pool.session_count(BatchKind::Check), 1);
}

#[test]
fn missing_object_keeps_session() {
    let repo = TestRepo::new();
    let pool = pool(&repo);

    let err = pool.object_info("no-such-branch").unwrap_err();
    assert!(err.is_not_found(), "unexpected error: {err}");
    let err = pool.object("0123456789012345678901234567890123456789").unwrap_err();
    assert!(err.is_not_found(), "unexpected error: {err}");

    // the sessions answered "missing" and are still usable
    assert_eq!(pool.object_info("HEAD").unwrap().kind, ObjectType::Commit);
    let (_, payload) = pool.object_bytes("HEAD:README.md").unwrap();
    assert_eq!(payload, b"# Test Repo\n");
    assert_eq!(pool.session_count(BatchKind::Check), 1);
    assert_eq!(pool.session_count(BatchKind::Contents), 1);
}

#[test]
fn revision_with_newline_is_rejected() {
    let repo = TestRepo::new();
    let pool = pool(&repo);

    let err = pool.object_info("HEAD\nHEAD").unwrap_err();
    assert!(matches!(err, CatFileError::InvalidRevision(_)));
    assert!(pool.object_info("HEAD").is_ok());
}

#[test]
fn sequential_objects_reuse_one_session() {
    let repo = TestRepo::new();
    for i in 0..5 {
        repo.commit_file(&format!("file{i}.txt"), &format!("content {i}\n"), "add file");
    }
    let pool = pool(&repo);

    for i in 0..5 {
        let rev = format!("HEAD:file{i}.txt");
        let (info, payload) = pool.object_bytes(&rev).unwrap();
        assert_eq!(info.kind, ObjectType::Blob);
        assert_eq!(payload, format!("content {i}\n").as_bytes());
    }
    assert_eq!(pool.session_count(BatchKind::Contents), 1);
}

#[test]
fn dropped_reader_is_drained() {
    let repo = TestRepo::new();
    repo.commit_file("big.txt", &"0123456789\n".repeat(2000), "big file");
    let pool = pool(&repo);

    {
        let (info, mut reader) = pool.object("HEAD:big.txt").unwrap();
        assert_eq!(info.size, 22000);
        let mut head = [0u8; 4];
        reader.read_exact(&mut head).unwrap();
        assert_eq!(&head, b"0123");
        assert_eq!(reader.remaining(), 22000 - 4);
    }

    // the same session answers the next request correctly
    let (_, payload) = pool.object_bytes("HEAD:README.md").unwrap();
    assert_eq!(payload, b"# Test Repo\n");
    assert_eq!(pool.session_count(BatchKind::Contents), 1);
}

#[test]
fn busy_session_is_not_shared() {
    let repo = TestRepo::new();
    repo.commit_file("a.txt", "alpha\n", "a");
    let pool = pool(&repo);

    let (_, mut first) = pool.object("HEAD:a.txt").unwrap();
    // the first reader still holds its session
    let (_, second) = pool.object_bytes("HEAD:README.md").unwrap();
    assert_eq!(second, b"# Test Repo\n");
    assert_eq!(pool.session_count(BatchKind::Contents), 2);

    let mut payload = String::new();
    first.read_to_string(&mut payload).unwrap();
    assert_eq!(payload, "alpha\n");
}

#[test]
fn concurrent_objects_from_two_threads() {
    let repo = TestRepo::new();
    repo.commit_file("one.txt", &"one\n".repeat(500), "one");
    repo.commit_file("two.txt", &"two\n".repeat(700), "two");
    let pool = pool(&repo);

    std::thread::scope(|scope| {
        for (rev, line, count) in [("HEAD:one.txt", "one\n", 500), ("HEAD:two.txt", "two\n", 700)] {
            let pool = &pool;
            scope.spawn(move || {
                for _ in 0..25 {
                    let (info, payload) = pool.object_bytes(rev).unwrap();
                    assert_eq!(info.size, (line.len() * count) as u64);
                    assert_eq!(payload, line.repeat(count).as_bytes());
                }
            });
        }
    });

    assert!(pool.session_count(BatchKind::Contents) <= 2);
}

#[test]
fn tag_and_tree_ids() {
    let repo = TestRepo::new();
    repo.create_tag("v1.0", "first release");
    let pool = pool(&repo);

    let target = pool.tag_object_id("v1.0").unwrap();
    assert_eq!(target.as_str(), repo.rev_parse("HEAD"));

    let tree = pool.tree_id("HEAD").unwrap();
    assert_eq!(tree.as_str(), repo.rev_parse("HEAD^{tree}"));

    // both reads left the session in sync
    assert_eq!(pool.object_info("v1.0").unwrap().kind, ObjectType::Tag);
    assert_eq!(pool.session_count(BatchKind::Contents), 1);
}

#[test]
fn tree_entries_match_ls_tree() {
    let repo = TestRepo::new();
    std::fs::create_dir(repo.path().join("src")).unwrap();
    repo.commit_file("src/lib.rs", "pub fn f() {}\n", "add src");
    let pool = pool(&repo);

    let entries = pool.tree_entries("HEAD^{tree}").unwrap();
    let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, ["README.md", "src"]);

    let readme = &entries[0];
    assert_eq!(readme.mode, "100644");
    assert_eq!(readme.kind(), ObjectType::Blob);
    assert_eq!(readme.id.as_str(), repo.rev_parse("HEAD:README.md"));

    let src = &entries[1];
    assert_eq!(src.mode, "40000");
    assert_eq!(src.kind(), ObjectType::Tree);
    assert_eq!(src.id.as_str(), repo.rev_parse("HEAD:src"));
}

#[test]
fn wrong_object_type_is_an_error() {
    let repo = TestRepo::new();
    let pool = pool(&repo);

    let err = pool.tree_id("HEAD:README.md").unwrap_err();
    assert!(matches!(err, CatFileError::Protocol(_)), "unexpected error: {err}");

    // the blob payload was skipped, so the session is still in sync
    let tree = pool.tree_id("HEAD").unwrap();
    assert_eq!(tree.as_str(), repo.rev_parse("HEAD^{tree}"));
    assert_eq!(pool.session_count(BatchKind::Contents), 1);
}

#[test]
fn closed_pool_rejects_requests() {
    let repo = TestRepo::new();
    let pool = pool(&repo);
    pool.object_info("HEAD").unwrap();

    pool.close();
    assert_eq!(pool.session_count(BatchKind::Check), 0);
    let err = pool.object_info("HEAD").unwrap_err();
    assert!(matches!(err, CatFileError::Closed(_)), "unexpected error: {err}");
}

#[test]
fn canceled_parent_closes_pool() {
    let repo = TestRepo::new();
    let ctx = Context::background();
    let pool = ObjectPool::new(&repo.env(), &ctx, repo.path());
    pool.object_info("HEAD").unwrap();

    ctx.cancel();
    assert!(matches!(pool.object_info("HEAD"), Err(CatFileError::Closed(_))));
}

#[test]
fn invalid_repository_fails_early() {
    let repo = TestRepo::new();
    let not_a_repo = TempDir::new().unwrap();
    let pool = ObjectPool::new(&repo.env(), &Context::background(), not_a_repo.path());

    let err = pool.object_info("HEAD").unwrap_err();
    assert!(matches!(err, CatFileError::InvalidRepository { .. }), "unexpected error: {err}");
    assert_eq!(pool.session_count(BatchKind::Check), 0);
}

#[test]
fn raw_session_protocol() {
    let repo = TestRepo::new();
    let env = repo.env();
    let ctx = Context::background();
    let mut session = BatchSession::spawn(&env, &ctx, repo.path(), BatchKind::Contents).unwrap();

    let info = session.request("HEAD:README.md").unwrap();
    let mut payload = vec![0u8; info.size as usize + 1];
    session.reader().read_exact(&mut payload).unwrap();
    assert_eq!(payload, b"# Test Repo\n\n");

    let info = session.request("HEAD").unwrap();
    assert_eq!(info.id, ObjectId::new(repo.rev_parse("HEAD")).unwrap());
    assert!(session.is_alive());
    session.close();
    assert!(env.processes().is_empty());
}
