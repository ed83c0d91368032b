//! Shared fixtures for integration tests.
//!
//! Repositories are created with the system git in a temp dir; the
//! library under test gets its own isolated HOME.

#![allow(dead_code)]

use std::path::Path;
use std::process::Command;
use std::sync::Arc;

use tempfile::TempDir;

use gitpipe::core::config::Settings;
use gitpipe::gitcmd::GitEnv;

/// Test fixture that creates a real git repository.
pub struct TestRepo {
    dir: TempDir,
    home: TempDir,
}

impl TestRepo {
    /// Create a new test repository with an initial commit on `main`.
    pub fn new() -> Self {
        let repo = Self::empty();
        repo.commit_file("README.md", "# Test Repo\n", "Initial commit");
        repo
    }

    /// Create a repository without commits.
    pub fn empty() -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        let home = TempDir::new().expect("failed to create temp home");

        run_git(dir.path(), &["init", "-q"]);
        run_git(dir.path(), &["symbolic-ref", "HEAD", "refs/heads/main"]);
        run_git(dir.path(), &["config", "user.email", "test@example.com"]);
        run_git(dir.path(), &["config", "user.name", "Test User"]);
        run_git(dir.path(), &["config", "commit.gpgsign", "false"]);
        run_git(dir.path(), &["config", "tag.gpgsign", "false"]);

        Self { dir, home }
    }

    /// Get the path to the repository.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Home directory handed to the library's git processes.
    pub fn home(&self) -> &Path {
        self.home.path()
    }

    /// Git environment with a home directory private to this fixture.
    pub fn env(&self) -> Arc<GitEnv> {
        test_env(self.home.path())
    }

    /// Create a file and commit it, returning the new commit id.
    pub fn commit_file(&self, path: &str, content: &str, message: &str) -> String {
        std::fs::write(self.path().join(path), content).unwrap();
        run_git(self.path(), &["add", "--", path]);
        run_git(self.path(), &["commit", "-q", "-m", message]);
        self.rev_parse("HEAD")
    }

    /// Create a branch at the current HEAD.
    pub fn create_branch(&self, name: &str) {
        run_git(self.path(), &["branch", name]);
    }

    /// Create an annotated tag at the current HEAD.
    pub fn create_tag(&self, name: &str, message: &str) {
        run_git(self.path(), &["tag", "-a", name, "-m", message]);
    }

    /// Resolve a revision using git directly.
    pub fn rev_parse(&self, rev: &str) -> String {
        self.git(&["rev-parse", rev])
    }

    /// Run git directly and return trimmed stdout.
    pub fn git(&self, args: &[&str]) -> String {
        let output = Command::new("git")
            .args(args)
            .current_dir(self.path())
            .output()
            .expect("git command failed");
        assert!(
            output.status.success(),
            "git {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
        String::from_utf8(output.stdout).unwrap().trim().to_string()
    }
}

/// A git environment whose HOME is `home`.
pub fn test_env(home: &Path) -> Arc<GitEnv> {
    let settings = Settings {
        home_dir: Some(home.to_path_buf()),
        ..Default::default()
    };
    GitEnv::new(&settings).expect("git must be installed to run tests")
}

/// Run a git command in the given directory.
pub fn run_git(dir: &Path, args: &[&str]) {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .expect("git command failed");

    if !output.status.success() {
        panic!(
            "git {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
    }
}
