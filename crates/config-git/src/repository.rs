//! One local mirror of one remote configuration repository

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use chrono::Utc;
use config_fs::{DirLock, io, mirror_directory_name};
use git2::build::RepoBuilder;
use git2::{AutotagOption, FetchOptions, FetchPrune, Repository};

use crate::auth::CredentialSelector;
use crate::handle::{LabelKind, RepositoryHandle};
use crate::label::{self, ORIGIN};
use crate::settings::RepositorySettings;
use crate::transport::{self, Deadline, HostKeyPolicy};
use crate::{Error, Result};

const FETCH_REFSPECS: [&str; 2] = [
    "+refs/heads/*:refs/remotes/origin/*",
    "+refs/tags/*:refs/tags/*",
];

#[derive(Debug, Default)]
struct MirrorState {
    /// Last successfully materialized state; replaced only after a refresh completes
    handle: Option<RepositoryHandle>,
    last_fetch: Option<Instant>,
}

/// Manages one local mirror of one remote location.
///
/// Every operation against the mirror (clone, fetch, checkout, status, branch
/// deletion, and reads through [`Self::with_materialized`]) runs under one
/// mutex, so requests for different labels of the same repository queue
/// instead of interleaving filesystem changes. Distinct repositories have
/// distinct mutexes and proceed in parallel.
#[derive(Debug)]
pub struct VersionedSourceRepository {
    settings: RepositorySettings,
    local_path: PathBuf,
    credentials: CredentialSelector,
    host_keys: HostKeyPolicy,
    state: Mutex<MirrorState>,
}

impl VersionedSourceRepository {
    /// Create a repository from settings.
    ///
    /// Nothing touches the network or the filesystem until the first
    /// materialization (or [`Self::warm_up`]).
    pub fn new(settings: RepositorySettings) -> Result<Self> {
        if settings.uri.trim().is_empty() {
            return Err(Error::NoSuchRepository {
                uri: settings.uri.clone(),
                message: "repository URI is empty".to_string(),
            });
        }
        let credentials = CredentialSelector::from_settings(&settings.credentials)?;
        Ok(Self::with_credentials(settings, credentials))
    }

    /// Create a repository with a programmatically built credential selector,
    /// for strategies (such as token exchange) that settings cannot express.
    pub fn with_credentials(settings: RepositorySettings, credentials: CredentialSelector) -> Self {
        let base_dir = settings.base_dir.clone().unwrap_or_else(default_base_dir);
        let local_path = base_dir.join(mirror_directory_name(&settings.uri));
        let host_keys = HostKeyPolicy::new(
            settings.strict_host_key_checking,
            &settings.known_host_fingerprints,
        );

        Self {
            settings,
            local_path,
            credentials,
            host_keys,
            state: Mutex::new(MirrorState::default()),
        }
    }

    pub fn uri(&self) -> &str {
        &self.settings.uri
    }

    pub fn settings(&self) -> &RepositorySettings {
        &self.settings
    }

    /// Deterministic local directory of the mirror.
    pub fn local_path(&self) -> &Path {
        &self.local_path
    }

    /// The last successfully materialized state, if any.
    pub fn current(&self) -> Option<RepositoryHandle> {
        self.lock_state().handle.clone()
    }

    /// Bring the mirror to `label` (or the default label) and return its state.
    pub fn materialize(&self, label: Option<&str>) -> Result<RepositoryHandle> {
        let mut state = self.lock_state();
        self.materialize_locked(&mut state, label)
    }

    /// Materialize `label` and run `read` against the resulting tree while the
    /// repository lock is still held.
    ///
    /// Reads done inside `read` can never observe files from two different
    /// commits, because no other refresh can start until it returns.
    pub fn with_materialized<T>(
        &self,
        label: Option<&str>,
        read: impl FnOnce(&RepositoryHandle) -> T,
    ) -> Result<T> {
        let mut state = self.lock_state();
        let handle = self.materialize_locked(&mut state, label)?;
        Ok(read(&handle))
    }

    /// Clone eagerly when `clone_on_start` is set.
    pub fn warm_up(&self) -> Result<()> {
        if !self.settings.clone_on_start {
            return Ok(());
        }
        tracing::info!(uri = %self.settings.uri, "Cloning configuration repository on start");
        self.materialize(None).map(|_| ())
    }

    /// Label a request resolves to.
    pub fn effective_label<'a>(&'a self, label: Option<&'a str>) -> &'a str {
        label
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .unwrap_or(&self.settings.default_label)
    }

    fn lock_state(&self) -> MutexGuard<'_, MirrorState> {
        // The state only changes after a refresh fully succeeds, so it is
        // consistent even if a holder panicked.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn materialize_locked(
        &self,
        state: &mut MirrorState,
        label: Option<&str>,
    ) -> Result<RepositoryHandle> {
        let label = self.effective_label(label).to_string();
        let _dir_lock = DirLock::acquire(&self.local_path)?;

        let (repo, freshly_cloned) = match self.open_existing()? {
            Some(repo) => (repo, false),
            None => (self.clone_fresh()?, true),
        };
        if freshly_cloned {
            state.last_fetch = Some(Instant::now());
        }

        let dirty = label::is_dirty(&repo)?;
        let force_pull = self.settings.force_pull;

        if dirty && !force_pull {
            let previous = state.handle.as_ref().filter(|h| h.current_ref == label);
            if let Some(previous) = previous {
                tracing::warn!(
                    uri = %self.settings.uri,
                    label = %label,
                    "Working copy is dirty and force_pull is off; serving last known state"
                );
                let mut handle = previous.clone();
                handle.dirty = true;
                state.handle = Some(handle.clone());
                return Ok(handle);
            }
        }

        let should_fetch = !freshly_cloned && !(dirty && !force_pull) && self.refresh_due(state);
        if should_fetch {
            // A failed fetch leaves the working tree exactly as it was.
            self.fetch(&repo)?;
            state.last_fetch = Some(Instant::now());
        }

        if dirty && force_pull {
            tracing::info!(
                uri = %self.settings.uri,
                "Discarding local modifications before refresh"
            );
            label::reset_to_head(&repo)?;
        }

        let clean = !dirty || force_pull;
        let kind = label::checkout_label(&repo, &label, clean)?;

        let mut last_known_remote_ref = None;
        if kind == LabelKind::Branch {
            last_known_remote_ref =
                label::remote_branch_commit(&repo, &label).map(|id| id.to_string());
            if dirty && force_pull {
                label::reset_to_remote(&repo, &label)?;
            } else if clean {
                match label::merge_remote(&repo, &label) {
                    Ok(()) => {}
                    Err(Error::MergeConflict { branch }) => {
                        // Stale-but-available: keep serving the previous commit.
                        tracing::warn!(
                            uri = %self.settings.uri,
                            branch = %branch,
                            "Merge with remote conflicted; serving local state"
                        );
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        if self.settings.delete_untracked_branches && should_fetch {
            label::delete_untracked_branches(&repo)?;
        }

        let version = label::head_commit_id(&repo)?.to_string();
        let handle = RepositoryHandle {
            uri: self.settings.uri.clone(),
            local_path: self.local_path.clone(),
            current_ref: label,
            label_kind: kind,
            version,
            last_known_remote_ref,
            dirty: dirty && !force_pull,
            refreshed_at: Utc::now(),
        };

        tracing::debug!(
            uri = %handle.uri,
            label = %handle.current_ref,
            version = %handle.version,
            "Materialized configuration repository"
        );
        if handle.is_stale() {
            tracing::warn!(
                uri = %handle.uri,
                label = %handle.current_ref,
                version = %handle.version,
                remote = ?handle.last_known_remote_ref,
                "Serving a commit behind the remote branch"
            );
        }
        state.handle = Some(handle.clone());
        Ok(handle)
    }

    fn refresh_due(&self, state: &MirrorState) -> bool {
        let rate = self.settings.refresh_rate();
        match state.last_fetch {
            Some(at) if !rate.is_zero() => at.elapsed() >= rate,
            _ => true,
        }
    }

    /// Open the mirror if it is a usable git repository.
    ///
    /// A directory that exists but is not a repository (an interrupted clone
    /// from an earlier process) is removed so the next step clones afresh.
    fn open_existing(&self) -> Result<Option<Repository>> {
        if !self.local_path.exists() {
            return Ok(None);
        }
        match Repository::open(&self.local_path) {
            Ok(repo) if repo.find_remote(ORIGIN).is_ok() => Ok(Some(repo)),
            Ok(_) | Err(_) => {
                tracing::warn!(
                    path = %self.local_path.display(),
                    "Local mirror is not a usable repository; recloning"
                );
                io::remove_dir_if_exists(&self.local_path)?;
                Ok(None)
            }
        }
    }

    fn clone_fresh(&self) -> Result<Repository> {
        let uri = &self.settings.uri;
        tracing::info!(
            uri = %uri,
            path = %self.local_path.display(),
            "Cloning configuration repository"
        );

        transport::bound_sockets(self.settings.timeout())?;
        let deadline = Deadline::new(self.settings.timeout());
        let callbacks = transport::remote_callbacks(
            self.credentials.select(uri),
            &self.host_keys,
            &deadline,
        );
        let mut fetch_options = FetchOptions::new();
        fetch_options
            .remote_callbacks(callbacks)
            .download_tags(AutotagOption::All);

        let cloned = RepoBuilder::new()
            .fetch_options(fetch_options)
            .clone(uri, &self.local_path);

        match cloned {
            Ok(repo) => Ok(repo),
            Err(e) => {
                let err = transport::classify(uri, &deadline, e);
                // Never leave a half-initialized mirror behind for the next call.
                if let Err(cleanup) = io::remove_dir_if_exists(&self.local_path) {
                    tracing::warn!(
                        path = %self.local_path.display(),
                        error = %cleanup,
                        "Failed to remove partial clone"
                    );
                }
                tracing::warn!(uri = %uri, error = %err, "Clone failed");
                Err(match err {
                    Error::RepositoryUnavailable { .. } | Error::Timeout { .. } => err,
                    other => Error::NoSuchRepository {
                        uri: uri.clone(),
                        message: other.to_string(),
                    },
                })
            }
        }
    }

    fn fetch(&self, repo: &Repository) -> Result<()> {
        let uri = &self.settings.uri;
        tracing::debug!(uri = %uri, "Fetching configuration repository");

        transport::bound_sockets(self.settings.timeout())?;
        let deadline = Deadline::new(self.settings.timeout());
        let callbacks = transport::remote_callbacks(
            self.credentials.select(uri),
            &self.host_keys,
            &deadline,
        );
        let mut fetch_options = FetchOptions::new();
        fetch_options
            .remote_callbacks(callbacks)
            .download_tags(AutotagOption::All);
        if self.settings.delete_untracked_branches {
            fetch_options.prune(FetchPrune::On);
        }

        let mut remote = repo.find_remote(ORIGIN)?;
        remote
            .fetch(&FETCH_REFSPECS, Some(&mut fetch_options), None)
            .map_err(|e| transport::classify(uri, &deadline, e))
    }
}

fn default_base_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("config-server")
        .join("repos")
}
