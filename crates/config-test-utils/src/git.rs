//! Git remote fixtures built entirely with `git2`.
//!
//! A [`ConfigRemote`] is a bare repository acting as the remote a config
//! server mirrors, plus a private seed clone used to author and push commits
//! into it. Tests point the server at [`ConfigRemote::uri`] and then move the
//! remote forward with [`ConfigRemote::commit_files`].

use std::fs;
use std::path::{Path, PathBuf};

use git2::build::CheckoutBuilder;
use git2::{BranchType, IndexAddOption, Repository, RepositoryInitOptions, Signature};
use tempfile::TempDir;

/// Default branch of every fixture remote.
pub const MAIN: &str = "main";

/// A bare remote and the seed clone that feeds it.
///
/// # Panics
/// Every method panics on git failure; fixtures are for tests only.
pub struct ConfigRemote {
    temp_dir: TempDir,
    bare: PathBuf,
    seed: Repository,
}

impl Default for ConfigRemote {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigRemote {
    /// Create a remote whose `main` branch holds one commit with a README.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("ConfigRemote: failed to create temp dir");
        let bare = temp_dir.path().join("remote.git");
        let seed_path = temp_dir.path().join("seed");

        let mut bare_opts = RepositoryInitOptions::new();
        bare_opts.bare(true).initial_head(MAIN);
        Repository::init_opts(&bare, &bare_opts)
            .unwrap_or_else(|e| panic!("ConfigRemote: failed to init bare remote: {e}"));

        let mut seed_opts = RepositoryInitOptions::new();
        seed_opts.initial_head(MAIN);
        let seed = Repository::init_opts(&seed_path, &seed_opts)
            .unwrap_or_else(|e| panic!("ConfigRemote: failed to init seed: {e}"));
        {
            let mut config = seed.config().expect("ConfigRemote: seed config");
            config.set_str("user.name", "Test User").unwrap();
            config.set_str("user.email", "test@test.com").unwrap();
            config.set_bool("commit.gpgsign", false).unwrap();
        }
        seed.remote("origin", &bare.to_string_lossy())
            .unwrap_or_else(|e| panic!("ConfigRemote: failed to add origin: {e}"));

        let remote = Self {
            temp_dir,
            bare,
            seed,
        };
        remote.commit_files(MAIN, &[("README.md", "# config\n")], "Initial commit");
        remote
    }

    /// URI of the bare remote, usable as a repository URI.
    pub fn uri(&self) -> String {
        self.bare.to_string_lossy().into_owned()
    }

    /// Scratch directory owned by the fixture, handy as a mirror base dir.
    pub fn scratch_dir(&self, name: &str) -> PathBuf {
        let dir = self.temp_dir.path().join(name);
        fs::create_dir_all(&dir).expect("ConfigRemote: failed to create scratch dir");
        dir
    }

    /// Write `files` on `branch` (created from `main` if missing), commit and push.
    ///
    /// Returns the new commit id.
    pub fn commit_files(&self, branch: &str, files: &[(&str, &str)], message: &str) -> String {
        self.switch_to(branch);
        let workdir = self.seed_workdir();
        for (relative, content) in files {
            let path = workdir.join(relative);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            fs::write(&path, content).unwrap();
        }
        self.commit_all(branch, message)
    }

    /// Delete `files` on `branch`, commit and push. Returns the new commit id.
    pub fn remove_files(&self, branch: &str, files: &[&str], message: &str) -> String {
        self.switch_to(branch);
        let workdir = self.seed_workdir();
        for relative in files {
            fs::remove_file(workdir.join(relative)).unwrap();
        }
        self.commit_all(branch, message)
    }

    /// Create `name` at the tip of `from` and push it.
    pub fn create_branch(&self, name: &str, from: &str) {
        let tip = self.branch_tip_commit(from);
        self.seed.branch(name, &tip, true).unwrap();
        self.push(&format!("refs/heads/{name}:refs/heads/{name}"));
    }

    /// Delete `name` on the remote.
    pub fn delete_branch(&self, name: &str) {
        self.push(&format!(":refs/heads/{name}"));
    }

    /// Create a lightweight tag at the tip of `branch`, push it, and return the commit id.
    pub fn tag(&self, name: &str, branch: &str) -> String {
        let tip = self.branch_tip_commit(branch);
        self.seed.tag_lightweight(name, tip.as_object(), true).unwrap();
        self.push(&format!("refs/tags/{name}:refs/tags/{name}"));
        tip.id().to_string()
    }

    /// Commit id at the tip of `branch`.
    pub fn head(&self, branch: &str) -> String {
        self.branch_tip_commit(branch).id().to_string()
    }

    fn seed_workdir(&self) -> &Path {
        self.seed.workdir().expect("seed clone has a working directory")
    }

    fn branch_tip_commit(&self, branch: &str) -> git2::Commit<'_> {
        self.seed
            .find_branch(branch, BranchType::Local)
            .unwrap_or_else(|e| panic!("ConfigRemote: no branch {branch}: {e}"))
            .get()
            .peel_to_commit()
            .unwrap()
    }

    fn switch_to(&self, branch: &str) {
        let unborn = self.seed.head().is_err();
        if !unborn && self.seed.find_branch(branch, BranchType::Local).is_err() {
            let base = self.branch_tip_commit(MAIN);
            self.seed.branch(branch, &base, false).unwrap();
        }
        self.seed.set_head(&format!("refs/heads/{branch}")).unwrap();
        if !unborn {
            self.seed
                .checkout_head(Some(CheckoutBuilder::new().force()))
                .unwrap();
        }
    }

    fn commit_all(&self, branch: &str, message: &str) -> String {
        let mut index = self.seed.index().unwrap();
        index
            .add_all(["*"].iter(), IndexAddOption::DEFAULT, None)
            .unwrap();
        index.update_all(["*"].iter(), None).unwrap();
        index.write().unwrap();

        let tree_id = index.write_tree().unwrap();
        let tree = self.seed.find_tree(tree_id).unwrap();
        let signature = Signature::now("Test User", "test@test.com").unwrap();
        let parents = match self.seed.head().ok().and_then(|h| h.peel_to_commit().ok()) {
            Some(parent) => vec![parent],
            None => Vec::new(),
        };
        let parent_refs: Vec<&git2::Commit<'_>> = parents.iter().collect();

        let id = self
            .seed
            .commit(Some("HEAD"), &signature, &signature, message, &tree, &parent_refs)
            .unwrap();
        self.push(&format!("+refs/heads/{branch}:refs/heads/{branch}"));
        id.to_string()
    }

    fn push(&self, refspec: &str) {
        let mut origin = self.seed.find_remote("origin").unwrap();
        origin
            .push(&[refspec], None)
            .unwrap_or_else(|e| panic!("ConfigRemote: push of {refspec} failed: {e}"));
    }
}
