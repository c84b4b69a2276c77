//! Integration tests for the Git interface.
//!
//! These tests use real git repositories created via tempfile to verify
//! that every `RepoAdapter` operation works against actual git.

use std::path::Path;
use std::process::Command;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use tempfile::TempDir;

use commit_mirage::core::types::{BranchName, Oid};
use commit_mirage::git::{Git, GitError, RepoAdapter};

/// Test fixture that creates a real git repository.
struct TestRepo {
    dir: TempDir,
}

impl TestRepo {
    /// Create a new test repository on `main` with an initial commit.
    fn new() -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");

        run_git(dir.path(), &["init", "--quiet"]);
        run_git(dir.path(), &["symbolic-ref", "HEAD", "refs/heads/main"]);
        run_git(dir.path(), &["config", "user.email", "test@example.com"]);
        run_git(dir.path(), &["config", "user.name", "Test User"]);
        run_git(dir.path(), &["config", "commit.gpgsign", "false"]);

        std::fs::write(dir.path().join("README.md"), "# Test Repo\n").unwrap();
        run_git(dir.path(), &["add", "README.md"]);
        run_git(dir.path(), &["commit", "--quiet", "-m", "Initial commit"]);

        Self { dir }
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn git(&self) -> Git {
        Git::open(self.path()).expect("failed to open test repo")
    }

    /// Create a file and commit it, returning the new commit OID.
    fn commit_file(&self, path: &str, content: &str, message: &str) -> Oid {
        std::fs::write(self.path().join(path), content).unwrap();
        run_git(self.path(), &["add", path]);
        run_git(self.path(), &["commit", "--quiet", "-m", message]);
        self.git().head_oid().unwrap()
    }

    fn stdout(&self, args: &[&str]) -> String {
        let output = Command::new("git")
            .args(args)
            .current_dir(self.path())
            .output()
            .expect("git command failed");
        String::from_utf8(output.stdout).unwrap().trim().to_string()
    }
}

/// Run a git command in the given directory.
fn run_git(dir: &Path, args: &[&str]) {
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

fn branch(name: &str) -> BranchName {
    BranchName::new(name).unwrap()
}

mod open {
    use super::*;

    #[test]
    fn discovers_from_subdirectory() {
        let repo = TestRepo::new();
        let sub = repo.path().join("nested/dir");
        std::fs::create_dir_all(&sub).unwrap();

        let git = Git::open(&sub).unwrap();
        assert_eq!(
            git.work_dir().canonicalize().unwrap(),
            repo.path().canonicalize().unwrap()
        );
    }

    #[test]
    fn paths_live_in_git_dir() {
        let repo = TestRepo::new();
        let paths = repo.git().paths();
        assert!(paths.mirage_dir().ends_with(".git/mirage"));
        assert!(!paths.is_worktree());
    }

    #[test]
    fn worktrees_share_the_mirage_dir() {
        let repo = TestRepo::new();
        let wt_parent = TempDir::new().unwrap();
        let wt = wt_parent.path().join("wt");
        run_git(
            repo.path(),
            &["worktree", "add", "--quiet", "-b", "wt", wt.to_str().unwrap()],
        );

        let main_paths = repo.git().paths();
        let wt_paths = Git::open(&wt).unwrap().paths();
        assert!(wt_paths.is_worktree());
        assert_eq!(
            wt_paths.common_dir().canonicalize().unwrap(),
            main_paths.common_dir().canonicalize().unwrap()
        );
    }

    #[test]
    fn bare_repo_is_rejected() {
        let dir = TempDir::new().unwrap();
        run_git(dir.path(), &["init", "--quiet", "--bare"]);
        assert!(matches!(Git::open(dir.path()), Err(GitError::BareRepo)));
    }
}

mod queries {
    use super::*;

    #[test]
    fn branch_and_head() {
        let repo = TestRepo::new();
        let git = repo.git();

        assert_eq!(git.current_branch().unwrap(), Some(branch("main")));
        assert_eq!(git.head_oid().unwrap().as_str(), repo.stdout(&["rev-parse", "HEAD"]));
        assert_eq!(git.branch_tip(&branch("main")).unwrap(), git.head_oid().unwrap());
    }

    #[test]
    fn detached_head_has_no_branch() {
        let repo = TestRepo::new();
        run_git(repo.path(), &["checkout", "--quiet", "--detach"]);
        assert_eq!(repo.git().current_branch().unwrap(), None);
    }

    #[test]
    fn resolve_and_ancestry() {
        let repo = TestRepo::new();
        let first = repo.git().head_oid().unwrap();
        let second = repo.commit_file("a.txt", "a\n", "Add a");
        let git = repo.git();

        assert_eq!(git.resolve_commit("HEAD~1").unwrap(), first);
        assert_eq!(git.resolve_commit(first.short(10)).unwrap(), first);
        assert!(git.is_ancestor(&first, &second).unwrap());
        assert!(!git.is_ancestor(&second, &first).unwrap());
        assert!(git.is_ancestor(&second, &second).unwrap());
        assert!(git.resolve_commit("no-such-rev").is_err());
    }

    #[test]
    fn commit_timestamp_reads_author_date() {
        let repo = TestRepo::new();
        let expected: i64 = repo.stdout(&["log", "-1", "--format=%at"]).parse().unwrap();
        let git = repo.git();
        let head = git.head_oid().unwrap();
        assert_eq!(git.commit_timestamp(&head).unwrap().timestamp(), expected);
    }

    #[test]
    fn dirty_detection() {
        let repo = TestRepo::new();
        assert!(!repo.git().is_dirty().unwrap());

        std::fs::write(repo.path().join("new.txt"), "untracked\n").unwrap();
        assert!(repo.git().is_dirty().unwrap());
        assert!(!repo.git().with_untracked(false).is_dirty().unwrap());

        std::fs::write(repo.path().join("README.md"), "changed\n").unwrap();
        assert!(repo.git().with_untracked(false).is_dirty().unwrap());
    }

    #[test]
    fn ignored_files_are_clean() {
        let repo = TestRepo::new();
        repo.commit_file(".gitignore", "*.log\n", "Ignore logs");
        std::fs::write(repo.path().join("build.log"), "noise\n").unwrap();
        assert!(!repo.git().is_dirty().unwrap());
    }
}

mod branches {
    use super::*;

    #[test]
    fn create_checkout_delete() {
        let repo = TestRepo::new();
        let git = repo.git();
        let head = git.head_oid().unwrap();
        let scratch = branch("mirage/scratch/0badcafe");

        git.create_branch(&scratch, &head).unwrap();
        assert!(git.branch_exists(&scratch));
        assert!(matches!(
            git.create_branch(&scratch, &head),
            Err(GitError::BranchExists { .. })
        ));

        git.checkout(&scratch).unwrap();
        assert_eq!(git.current_branch().unwrap(), Some(scratch.clone()));

        git.checkout(&branch("main")).unwrap();
        git.delete_branch(&scratch).unwrap();
        assert!(!git.branch_exists(&scratch));
    }

    #[test]
    fn checkout_of_unknown_branch_fails() {
        let repo = TestRepo::new();
        let err = repo.git().checkout(&branch("nope")).unwrap_err();
        assert!(matches!(err, GitError::CommandFailed { .. }));
    }

    #[test]
    fn fast_forward_moves_current_branch() {
        let repo = TestRepo::new();
        run_git(repo.path(), &["checkout", "--quiet", "-b", "ahead"]);
        let tip = repo.commit_file("a.txt", "a\n", "Add a");
        run_git(repo.path(), &["checkout", "--quiet", "main"]);

        let git = repo.git();
        git.fast_forward(&branch("ahead")).unwrap();
        assert_eq!(git.head_oid().unwrap(), tip);
    }

    #[test]
    fn fast_forward_refuses_divergence() {
        let repo = TestRepo::new();
        run_git(repo.path(), &["checkout", "--quiet", "-b", "side"]);
        repo.commit_file("a.txt", "a\n", "Add a");
        run_git(repo.path(), &["checkout", "--quiet", "main"]);
        repo.commit_file("b.txt", "b\n", "Add b");

        assert!(repo.git().fast_forward(&branch("side")).is_err());
    }
}

mod commits {
    use super::*;

    #[test]
    fn backdated_commit_sets_both_dates() {
        let repo = TestRepo::new();
        let git = repo.git();
        let parent = git.head_oid().unwrap();
        let when = Utc.with_ymd_and_hms(2023, 5, 17, 10, 30, 0).unwrap();

        git.write_file(Path::new("src/lib.rs"), b"pub fn f() {}\n").unwrap();
        let oid = git
            .stage_and_commit(&[Path::new("src/lib.rs")], "Add lib\n\nBody.\n", when)
            .unwrap();

        assert_eq!(git.head_oid().unwrap(), oid);
        assert_eq!(git.resolve_commit("HEAD~1").unwrap(), parent);
        assert_eq!(
            repo.stdout(&["log", "-1", "--format=%at %ct %s"]),
            format!("{0} {0} Add lib", when.timestamp())
        );
        assert_eq!(repo.stdout(&["log", "-1", "--format=%an <%ae>"]), "Test User <test@example.com>");
        assert!(!git.is_dirty().unwrap());
    }

    #[test]
    fn missing_file_is_staged_as_deletion() {
        let repo = TestRepo::new();
        repo.commit_file("gone.txt", "bye\n", "Add gone");
        let git = repo.git();

        std::fs::remove_file(repo.path().join("gone.txt")).unwrap();
        git.stage_and_commit(&[Path::new("gone.txt")], "Remove gone", Utc::now())
            .unwrap();

        assert_eq!(repo.stdout(&["ls-files", "gone.txt"]), "");
        assert!(!git.is_dirty().unwrap());
    }

    #[test]
    fn amend_changes_date_and_content_only() {
        let repo = TestRepo::new();
        let git = repo.git();
        let parent = git.head_oid().unwrap();
        let first = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
        let second = Utc.with_ymd_and_hms(2023, 2, 1, 0, 0, 0).unwrap();

        git.write_file(Path::new("x.txt"), b"one\n").unwrap();
        let original = git
            .stage_and_commit(&[Path::new("x.txt")], "Add x", first)
            .unwrap();

        git.write_file(Path::new("x.txt"), b"two\n").unwrap();
        run_git(repo.path(), &["add", "x.txt"]);
        let amended = git.amend_commit_timestamp(second).unwrap();

        assert_ne!(amended, original);
        assert_eq!(git.resolve_commit("HEAD~1").unwrap(), parent);
        assert_eq!(repo.stdout(&["log", "-1", "--format=%s"]), "Add x");
        assert_eq!(
            repo.stdout(&["log", "-1", "--format=%at"]),
            second.timestamp().to_string()
        );
        assert_eq!(repo.stdout(&["show", "HEAD:x.txt"]), "two");
    }
}

mod restore {
    use super::*;

    #[test]
    fn uncommitted_writes_are_reset_to_head() {
        let repo = TestRepo::new();
        let git = repo.git();

        git.write_file(Path::new("README.md"), b"scribbled\n").unwrap();
        git.write_file(Path::new("notes/new.md"), b"draft\n").unwrap();
        run_git(repo.path(), &["add", "README.md"]);
        assert!(git.is_dirty().unwrap());

        git.restore_paths(&[Path::new("README.md"), Path::new("notes/new.md")])
            .unwrap();

        assert!(!git.is_dirty().unwrap());
        assert!(!repo.path().join("notes/new.md").exists());
        assert_eq!(repo.stdout(&["diff", "--cached", "--name-only"]), "");
        assert_eq!(
            std::fs::read_to_string(repo.path().join("README.md")).unwrap(),
            "# Test Repo\n"
        );
    }

    #[test]
    fn other_paths_are_left_alone() {
        let repo = TestRepo::new();
        let git = repo.git();
        repo.commit_file("keep.txt", "keep\n", "Add keep");

        std::fs::write(repo.path().join("keep.txt"), "edited\n").unwrap();
        git.write_file(Path::new("README.md"), b"scribbled\n").unwrap();

        git.restore_paths(&[Path::new("README.md")]).unwrap();

        assert_eq!(
            std::fs::read_to_string(repo.path().join("keep.txt")).unwrap(),
            "edited\n"
        );
        assert_eq!(repo.stdout(&["status", "--porcelain"]), "M keep.txt");
    }

    #[test]
    fn file_at_reads_historic_content() {
        let repo = TestRepo::new();
        let base = repo.git().head_oid().unwrap();
        repo.commit_file("README.md", "# Changed\n", "Change readme");
        let git = repo.git();

        let then = git.file_at(&base, Path::new("README.md")).unwrap().unwrap();
        let now = git
            .file_at(&git.head_oid().unwrap(), Path::new("README.md"))
            .unwrap()
            .unwrap();
        assert_ne!(then, now);
        assert_eq!(now, b"# Changed\n");
        assert_eq!(git.file_at(&base, Path::new("missing.txt")).unwrap(), None);
    }
}

mod patches {
    use super::*;

    #[test]
    fn identical_commits_have_empty_diff() {
        let repo = TestRepo::new();
        let git = repo.git();
        let head = git.head_oid().unwrap();
        assert!(git.diff_between(&head, &head).unwrap().is_empty());
    }

    #[test]
    fn reverse_apply_undoes_a_diff() {
        let repo = TestRepo::new();
        let base = repo.git().head_oid().unwrap();
        repo.commit_file("README.md", "# Changed\n", "Change readme");
        std::fs::write(repo.path().join("bin.dat"), [0u8, 159, 146, 150, 0, 1]).unwrap();
        run_git(repo.path(), &["add", "bin.dat"]);
        run_git(repo.path(), &["commit", "--quiet", "-m", "Add binary"]);

        let git = repo.git();
        let head = git.head_oid().unwrap();
        let patch = git.diff_between(&base, &head).unwrap();
        assert!(!patch.is_empty());

        git.reverse_apply(&patch).unwrap();
        assert_eq!(
            std::fs::read_to_string(repo.path().join("README.md")).unwrap(),
            "# Test Repo\n"
        );
        assert!(!repo.path().join("bin.dat").exists());

        // Staged as well as written.
        assert_eq!(repo.stdout(&["diff", "--cached", "--stat", base.as_str()]), "");
    }

    #[test]
    fn reverse_apply_of_stale_patch_fails() {
        let repo = TestRepo::new();
        let base = repo.git().head_oid().unwrap();
        let changed = repo.commit_file("README.md", "# Changed\n", "Change readme");
        let git = repo.git();
        let patch = git.diff_between(&base, &changed).unwrap();

        repo.commit_file("README.md", "# Something else\n", "Change again");
        let err = git.reverse_apply(&patch).unwrap_err();
        assert!(matches!(err, GitError::CommandFailed { .. }));
    }
}

mod rebase {
    use super::*;

    #[test]
    fn replays_branch_onto_upstream() {
        let repo = TestRepo::new();
        run_git(repo.path(), &["branch", "base"]);
        repo.commit_file("later.txt", "later\n", "Later");

        run_git(repo.path(), &["checkout", "--quiet", "base"]);
        repo.commit_file("inserted.txt", "new\n", "Inserted");
        run_git(repo.path(), &["checkout", "--quiet", "main"]);

        let git = repo.git();
        git.rebase_onto(&branch("base"), &branch("main")).unwrap();

        assert_eq!(repo.stdout(&["log", "--format=%s", "-3"]), "Later\nInserted\nInitial commit");
        assert_eq!(git.current_branch().unwrap(), Some(branch("main")));
    }

    #[test]
    fn conflict_is_aborted_and_reported() {
        let repo = TestRepo::new();
        run_git(repo.path(), &["branch", "base"]);
        let main_tip = repo.commit_file("README.md", "# Main\n", "Main edit");

        run_git(repo.path(), &["checkout", "--quiet", "base"]);
        repo.commit_file("README.md", "# Base\n", "Base edit");
        run_git(repo.path(), &["checkout", "--quiet", "main"]);

        let git = repo.git();
        let err = git.rebase_onto(&branch("base"), &branch("main")).unwrap_err();
        assert!(matches!(err, GitError::Conflict { .. }));

        assert!(!repo.path().join(".git/rebase-merge").exists());
        assert!(!repo.path().join(".git/rebase-apply").exists());
        assert_eq!(git.branch_tip(&branch("main")).unwrap(), main_tip);
        assert!(!git.is_dirty().unwrap());
    }
}

mod deadlines {
    use super::*;

    #[test]
    fn zero_timeout_reports_timeout_or_finishes() {
        let repo = TestRepo::new();
        let git = repo.git().with_timeout(Duration::ZERO);
        let head = git.head_oid().unwrap();

        // A zero deadline either catches the child still running or sees it
        // already exited on the first poll.
        match git.diff_between(&head, &head) {
            Ok(patch) => assert!(patch.is_empty()),
            Err(err) => assert!(matches!(err, GitError::Timeout { .. })),
        }
    }
}
