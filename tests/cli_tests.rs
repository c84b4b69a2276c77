//! CLI tests for the `mirage` binary.
//!
//! These run the real binary against temporary git repositories.

use std::path::{Path, PathBuf};
use std::process::Command as StdCommand;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

struct Fixture {
    repo: TempDir,
    home: TempDir,
}

impl Fixture {
    fn new() -> Self {
        let repo = TempDir::new().unwrap();
        let home = TempDir::new().unwrap();

        git(repo.path(), &["init", "--quiet"]);
        git(repo.path(), &["symbolic-ref", "HEAD", "refs/heads/main"]);
        git(repo.path(), &["config", "user.email", "test@example.com"]);
        git(repo.path(), &["config", "user.name", "Test User"]);
        git(repo.path(), &["config", "commit.gpgsign", "false"]);
        std::fs::write(repo.path().join("a.txt"), "alpha\n").unwrap();
        std::fs::write(repo.path().join("b.txt"), "beta\n").unwrap();
        git(repo.path(), &["add", "--all"]);
        git(repo.path(), &["commit", "--quiet", "-m", "Initial commit"]);

        Self { repo, home }
    }

    fn path(&self) -> &Path {
        self.repo.path()
    }

    /// `mirage` with configuration isolated from the user's.
    fn mirage(&self) -> Command {
        let mut cmd = Command::cargo_bin("mirage").unwrap();
        cmd.env("HOME", self.home.path())
            .env("XDG_CONFIG_HOME", self.home.path())
            .env_remove("MIRAGE_CONFIG")
            .env_remove("RUST_LOG");
        cmd
    }

    /// Write a plan next to the repository; revert content comes from disk.
    fn plan(&self, a_revert: Option<&str>) -> PathBuf {
        let a_revert = a_revert
            .map(|r| format!(r#", "revert_content": {}"#, serde_json::json!(r)))
            .unwrap_or_default();
        let json = format!(
            r#"{{ "pairs": [
                {{ "file_path": "a.txt", "apply_content": "alpha\nmore\n"{a_revert},
                   "commit_message_apply": "Extend a", "commit_message_revert": "Trim a" }},
                {{ "file_path": "b.txt", "apply_content": "beta\nmore\n",
                   "commit_message_apply": "Extend b", "commit_message_revert": "Trim b" }}
            ] }}"#
        );
        let path = self.home.path().join("plan.json");
        std::fs::write(&path, json).unwrap();
        path
    }

    fn rev_parse(&self, rev: &str) -> String {
        git_stdout(self.path(), &["rev-parse", rev])
    }
}

fn git(dir: &Path, args: &[&str]) {
    let status = StdCommand::new("git")
        .args(args)
        .current_dir(dir)
        .status()
        .expect("git command failed");
    assert!(status.success(), "git {args:?} failed");
}

fn git_stdout(dir: &Path, args: &[&str]) -> String {
    let output = StdCommand::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .expect("git command failed");
    assert!(output.status.success(), "git {args:?} failed");
    String::from_utf8(output.stdout).unwrap().trim().to_string()
}

const WINDOW: [&str; 4] = ["--since", "2024-01-01", "--until", "2024-02-01"];

#[test]
fn version_flag_works() {
    Command::cargo_bin("mirage")
        .unwrap()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("mirage"));
}

#[test]
fn missing_subcommand_is_a_usage_error() {
    Command::cargo_bin("mirage").unwrap().assert().code(2);
}

#[test]
fn completion_generates_script() {
    Command::cargo_bin("mirage")
        .unwrap()
        .args(["completion", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("mirage"));
}

mod run {
    use super::*;

    #[test]
    fn successful_run_keeps_tree() {
        let fx = Fixture::new();
        let tree = fx.rev_parse("HEAD^{tree}");
        let plan = fx.plan(None);

        fx.mirage()
            .arg("run")
            .arg(fx.path())
            .arg("--plan")
            .arg(&plan)
            .args(["--commits", "3", "--seed", "5"])
            .args(WINDOW)
            .assert()
            .success()
            .stdout(predicate::str::contains("Created 3 commit(s) on main"))
            .stdout(predicate::str::contains("Tree unchanged"));

        assert_eq!(fx.rev_parse("HEAD^{tree}"), tree);
        assert_eq!(git_stdout(fx.path(), &["rev-list", "--count", "main"]), "4");
    }

    #[test]
    fn commit_count_comes_from_repo_config() {
        let fx = Fixture::new();
        let config_dir = fx.path().join(".git/mirage");
        std::fs::create_dir_all(&config_dir).unwrap();
        std::fs::write(config_dir.join("config.toml"), "default_commits = 4\n").unwrap();
        let plan = fx.plan(None);

        fx.mirage()
            .arg("run")
            .arg(fx.path())
            .arg("--plan")
            .arg(&plan)
            .args(WINDOW)
            .assert()
            .success()
            .stdout(predicate::str::contains("Created 4 commit(s)"));
    }

    #[test]
    fn missing_revert_is_read_at_the_insertion_point() {
        let fx = Fixture::new();
        let base = fx.rev_parse("HEAD");
        std::fs::write(fx.path().join("a.txt"), "alpha\nlater\n").unwrap();
        git(fx.path(), &["commit", "--quiet", "-am", "Later edit of a"]);
        let tree = fx.rev_parse("HEAD^{tree}");
        let plan = fx.plan(None);

        fx.mirage()
            .arg("run")
            .arg(fx.path())
            .arg("--plan")
            .arg(&plan)
            .args(["--commits", "2", "--residual", "reject", "--after", &base])
            .args(WINDOW)
            .assert()
            .success()
            .stdout(predicate::str::contains("Rebased later commits of main"))
            .stdout(predicate::str::contains("Tree unchanged"));

        assert_eq!(fx.rev_parse("HEAD^{tree}"), tree);
        // The revert commit restores a.txt as it was at the insertion point.
        let reverted = git_stdout(fx.path(), &["show", "main~1:a.txt"]);
        assert_eq!(reverted, "alpha");
    }

    #[test]
    fn dirty_tree_exits_with_3() {
        let fx = Fixture::new();
        std::fs::write(fx.path().join("a.txt"), "edited\n").unwrap();
        let plan = fx.plan(Some("alpha\n"));

        fx.mirage()
            .arg("run")
            .arg(fx.path())
            .arg("--plan")
            .arg(&plan)
            .args(WINDOW)
            .assert()
            .code(3)
            .stderr(predicate::str::contains("uncommitted changes"));
    }

    #[test]
    fn too_many_commits_exits_with_4() {
        let fx = Fixture::new();
        let plan = fx.plan(None);

        fx.mirage()
            .arg("run")
            .arg(fx.path())
            .arg("--plan")
            .arg(&plan)
            .args(["--commits", "9"])
            .args(WINDOW)
            .assert()
            .code(4);
    }

    #[test]
    fn inverted_window_exits_with_4() {
        let fx = Fixture::new();
        let plan = fx.plan(None);

        fx.mirage()
            .arg("run")
            .arg(fx.path())
            .arg("--plan")
            .arg(&plan)
            .args(["--since", "2024-02-01", "--until", "2024-01-01"])
            .assert()
            .code(4)
            .stderr(predicate::str::contains("invalid window"));
    }

    #[test]
    fn missing_plan_exits_with_4() {
        let fx = Fixture::new();

        fx.mirage()
            .arg("run")
            .arg(fx.path())
            .args(["--plan", "does-not-exist.json"])
            .assert()
            .code(4);
    }

    #[test]
    fn bad_time_is_a_usage_error() {
        let fx = Fixture::new();
        let plan = fx.plan(None);

        fx.mirage()
            .arg("run")
            .arg(fx.path())
            .arg("--plan")
            .arg(&plan)
            .args(["--since", "yesterday"])
            .assert()
            .code(2);
    }
}

mod preview {
    use super::*;

    #[test]
    fn lists_commits_without_touching_the_repo() {
        let fx = Fixture::new();
        let head = fx.rev_parse("HEAD");
        let plan = fx.plan(None);

        fx.mirage()
            .arg("preview")
            .arg(fx.path())
            .arg("--plan")
            .arg(&plan)
            .args(["--commits", "4", "--seed", "1"])
            .args(WINDOW)
            .assert()
            .success()
            .stdout(predicate::str::contains("Branch main"))
            .stdout(predicate::str::contains("1. 2024-01"))
            .stdout(predicate::str::contains("apply a.txt"))
            .stdout(predicate::str::contains("revert b.txt"));

        assert_eq!(fx.rev_parse("HEAD"), head);
        assert!(git_stdout(fx.path(), &["branch", "--list", "mirage/*"]).is_empty());
    }

    #[test]
    fn works_on_a_dirty_tree() {
        let fx = Fixture::new();
        let plan = fx.plan(Some("alpha\n"));
        std::fs::write(fx.path().join("scratch.txt"), "wip\n").unwrap();

        fx.mirage()
            .arg("preview")
            .arg(fx.path())
            .arg("--plan")
            .arg(&plan)
            .args(WINDOW)
            .assert()
            .success();
    }

    #[test]
    fn quiet_prints_nothing() {
        let fx = Fixture::new();
        let plan = fx.plan(None);

        fx.mirage()
            .args(["--quiet", "preview"])
            .arg(fx.path())
            .arg("--plan")
            .arg(&plan)
            .args(WINDOW)
            .assert()
            .success()
            .stdout(predicate::str::is_empty());
    }
}

mod recover {
    use super::*;

    #[test]
    fn nothing_to_recover() {
        let fx = Fixture::new();

        fx.mirage()
            .arg("recover")
            .arg(fx.path())
            .assert()
            .success()
            .stdout(predicate::str::contains("No failed run"));
    }

    #[test]
    fn rejected_run_can_be_discarded() {
        let fx = Fixture::new();
        let head = fx.rev_parse("HEAD");
        // Revert content that differs from disk leaves a residual.
        let plan = fx.plan(Some("alpha, reworded\n"));

        fx.mirage()
            .arg("run")
            .arg(fx.path())
            .arg("--plan")
            .arg(&plan)
            .args(["--residual", "reject"])
            .args(WINDOW)
            .assert()
            .code(1)
            .stderr(predicate::str::contains("git branch -D mirage/scratch/"));

        assert_eq!(fx.rev_parse("main"), head);
        assert!(fx.path().join(".git/mirage/recovery.json").exists());

        // A new run is refused until the failure is dealt with.
        fx.mirage()
            .arg("run")
            .arg(fx.path())
            .arg("--plan")
            .arg(&plan)
            .args(WINDOW)
            .assert()
            .failure()
            .stderr(predicate::str::contains("mirage recover"));

        fx.mirage()
            .arg("recover")
            .arg(fx.path())
            .assert()
            .success()
            .stdout(predicate::str::contains("failed during reconciling"));

        fx.mirage()
            .args(["recover", "--restore", "--discard"])
            .arg(fx.path())
            .assert()
            .success()
            .stdout(predicate::str::contains("Recovery record removed"));

        assert!(git_stdout(fx.path(), &["branch", "--list", "mirage/*"]).is_empty());
        assert!(!fx.path().join(".git/mirage/recovery.json").exists());
        assert_eq!(git_stdout(fx.path(), &["rev-parse", "--abbrev-ref", "HEAD"]), "main");
    }
}
