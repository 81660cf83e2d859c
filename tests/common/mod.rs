#![allow(dead_code)]

use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::{tempdir, TempDir};

pub fn has_git() -> bool {
    Command::new("git").arg("--version").output().is_ok()
}

/// A scratch repository driven through the git CLI, with pinned dates so
/// commit ids and buckets are reproducible.
pub struct Fixture {
    dir: TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = tempdir().unwrap();
        let fixture = Self { dir };
        fixture.git(&["init", "-q"]);
        fixture.git(&["symbolic-ref", "HEAD", "refs/heads/main"]);
        fixture.git(&["config", "user.name", "Fixture"]);
        fixture.git(&["config", "user.email", "fixture@example.com"]);
        fixture.git(&["config", "commit.gpgsign", "false"]);
        fixture.git(&["config", "core.autocrlf", "false"]);
        fixture
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Runs git in the repository and returns trimmed stdout.
    pub fn git(&self, args: &[&str]) -> String {
        self.git_dated(args, "2024-01-01T00:00:00+00:00")
    }

    fn git_dated(&self, args: &[&str], date: &str) -> String {
        let out = Command::new("git")
            .args(args)
            .current_dir(self.path())
            .env("GIT_AUTHOR_DATE", date)
            .env("GIT_COMMITTER_DATE", date)
            .env("GIT_CONFIG_NOSYSTEM", "1")
            .output()
            .unwrap();
        assert!(
            out.status.success(),
            "git {:?} failed: {}",
            args,
            String::from_utf8_lossy(&out.stderr)
        );
        String::from_utf8_lossy(&out.stdout).trim().to_string()
    }

    pub fn write(&self, name: &str, content: &[u8]) {
        let path = self.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    /// Writes `files`, stages everything and commits as `author` at `date`
    /// (any format git accepts). Returns the new commit id.
    pub fn commit(&self, author: &str, date: &str, files: &[(&str, &str)], message: &str) -> String {
        for (name, content) in files {
            self.write(name, content.as_bytes());
        }
        self.commit_staged(author, date, message)
    }

    pub fn commit_staged(&self, author: &str, date: &str, message: &str) -> String {
        self.git(&["add", "-A"]);
        let author = format!("{author} <{}@example.com>", author.to_lowercase());
        self.git_dated(
            &["commit", "-q", "--allow-empty", "--author", &author, "-m", message],
            date,
        );
        self.head()
    }

    pub fn merge(&self, branch: &str, date: &str) -> String {
        let message = format!("merge {branch}");
        self.git_dated(&["merge", "-q", "--no-ff", branch, "-m", &message], date);
        self.head()
    }

    pub fn head(&self) -> String {
        self.git(&["rev-parse", "HEAD"])
    }
}

/// `count` commits by `author`, one per day starting at `first_day` of
/// January 2024, each touching its own file.
pub fn commits_by(fixture: &Fixture, author: &str, first_day: u32, count: u32) {
    for i in 0..count {
        let day = first_day + i;
        let date = format!("2024-01-{day:02}T10:00:00+00:00");
        let name = format!("{}/file{i}.txt", author.to_lowercase());
        let content = format!("line one\nline two by {author}\n");
        fixture.commit(author, &date, &[(&name, &content)], &format!("{author} change {i}"));
    }
}
