//! git2 helpers for resolving, checking out and advancing labels
//!
//! These functions encapsulate the git2 sequences the repository runs while
//! holding its lock. None of them touch the network.

use std::collections::HashSet;

use git2::build::CheckoutBuilder;
use git2::{BranchType, MergeOptions, Oid, Repository, ResetType, Signature, StatusOptions};

use crate::handle::LabelKind;
use crate::{Error, Result};

/// Remote name used for every mirror.
pub const ORIGIN: &str = "origin";

fn checkout_builder(force: bool) -> CheckoutBuilder<'static> {
    let mut builder = CheckoutBuilder::new();
    if force {
        builder.force();
    } else {
        builder.safe();
    }
    builder
}

/// Whether tracked files carry uncommitted modifications.
///
/// Untracked and ignored files do not count: a hard reset cannot remove them,
/// so counting them would keep a force-pulled mirror dirty forever.
pub fn is_dirty(repo: &Repository) -> Result<bool> {
    let mut opts = StatusOptions::new();
    opts.include_untracked(false).include_ignored(false);
    let statuses = repo.statuses(Some(&mut opts))?;
    Ok(!statuses.is_empty())
}

/// Name of the checked-out branch, or `None` when HEAD is detached or unborn.
pub fn current_branch(repo: &Repository) -> Option<String> {
    let head = repo.head().ok()?;
    if head.is_branch() {
        head.shorthand().map(str::to_string)
    } else {
        None
    }
}

/// Commit id HEAD points at.
pub fn head_commit_id(repo: &Repository) -> Result<Oid> {
    Ok(repo.head()?.peel_to_commit()?.id())
}

/// Commit id of `origin/<branch>`, if the remote tracking ref exists.
pub fn remote_branch_commit(repo: &Repository, branch: &str) -> Option<Oid> {
    repo.find_reference(&format!("refs/remotes/{ORIGIN}/{branch}"))
        .ok()?
        .peel_to_commit()
        .ok()
        .map(|c| c.id())
}

/// Check out `label`, trying branch, remote branch, tag, then commit id.
///
/// A remote-only branch gets a local tracking branch created first. With
/// `force` unset the checkout refuses to overwrite local modifications.
pub fn checkout_label(repo: &Repository, label: &str, force: bool) -> Result<LabelKind> {
    if repo.find_branch(label, BranchType::Local).is_ok() {
        tracing::debug!(label, "Checking out local branch");
        repo.set_head(&format!("refs/heads/{label}"))?;
        repo.checkout_head(Some(&mut checkout_builder(force)))?;
        return Ok(LabelKind::Branch);
    }

    let remote_name = format!("{ORIGIN}/{label}");
    if let Ok(remote_branch) = repo.find_branch(&remote_name, BranchType::Remote) {
        tracing::debug!(label, "Creating tracking branch for remote label");
        let commit = remote_branch.get().peel_to_commit()?;
        let mut local = repo.branch(label, &commit, false)?;
        local.set_upstream(Some(&remote_name))?;
        repo.set_head(&format!("refs/heads/{label}"))?;
        repo.checkout_head(Some(&mut checkout_builder(force)))?;
        return Ok(LabelKind::Branch);
    }

    if let Ok(tag) = repo.find_reference(&format!("refs/tags/{label}")) {
        tracing::debug!(label, "Checking out tag");
        let commit = tag.peel_to_commit()?;
        repo.checkout_tree(commit.as_object(), Some(&mut checkout_builder(force)))?;
        repo.set_head_detached(commit.id())?;
        return Ok(LabelKind::Tag);
    }

    if let Ok(commit) = repo
        .revparse_single(label)
        .and_then(|object| object.peel_to_commit())
    {
        tracing::debug!(label, commit = %commit.id(), "Checking out commit");
        repo.checkout_tree(commit.as_object(), Some(&mut checkout_builder(force)))?;
        repo.set_head_detached(commit.id())?;
        return Ok(LabelKind::Commit);
    }

    Err(Error::NoSuchLabel {
        label: label.to_string(),
    })
}

/// Discard local modifications of tracked files.
pub fn reset_to_head(repo: &Repository) -> Result<()> {
    let head = repo.head()?.peel_to_commit()?;
    repo.reset(head.as_object(), ResetType::Hard, Some(&mut checkout_builder(true)))?;
    Ok(())
}

/// Hard-reset the checked-out `branch` to `origin/<branch>`.
///
/// Returns `false` when the remote tracking ref does not exist.
pub fn reset_to_remote(repo: &Repository, branch: &str) -> Result<bool> {
    let Some(target) = remote_branch_commit(repo, branch) else {
        return Ok(false);
    };
    let commit = repo.find_commit(target)?;
    repo.reset(commit.as_object(), ResetType::Hard, Some(&mut checkout_builder(true)))?;
    tracing::info!(branch, commit = %target, "Hard reset to remote");
    Ok(true)
}

/// Advance the checked-out `branch` to include `origin/<branch>`.
///
/// Fast-forwards when possible and otherwise creates a merge commit. On
/// conflicts the merge is abandoned, the tree is restored to its previous
/// commit and [`Error::MergeConflict`] is returned.
pub fn merge_remote(repo: &Repository, branch: &str) -> Result<()> {
    let Some(target) = remote_branch_commit(repo, branch) else {
        return Ok(());
    };
    let annotated = repo.find_annotated_commit(target)?;
    let (analysis, _) = repo.merge_analysis(&[&annotated])?;

    if analysis.is_up_to_date() {
        return Ok(());
    }

    if analysis.is_fast_forward() {
        let refname = format!("refs/heads/{branch}");
        let mut reference = repo.find_reference(&refname)?;
        reference.set_target(target, &format!("refresh: fast-forward to {target}"))?;
        repo.checkout_head(Some(&mut checkout_builder(true)))?;
        tracing::debug!(branch, commit = %target, "Fast-forwarded");
        return Ok(());
    }

    let previous = repo.head()?.peel_to_commit()?;
    let mut merge_opts = MergeOptions::new();
    repo.merge(&[&annotated], Some(&mut merge_opts), None)?;

    let mut index = repo.index()?;
    if index.has_conflicts() {
        repo.cleanup_state()?;
        repo.reset(
            previous.as_object(),
            ResetType::Hard,
            Some(&mut checkout_builder(true)),
        )?;
        return Err(Error::MergeConflict {
            branch: branch.to_string(),
        });
    }

    let signature = repo
        .signature()
        .or_else(|_| Signature::now("config-server", "config-server@localhost"))?;
    let tree_id = index.write_tree()?;
    let tree = repo.find_tree(tree_id)?;
    let incoming = repo.find_commit(target)?;

    let message = format!("Merge remote-tracking branch '{ORIGIN}/{branch}'");
    repo.commit(
        Some("HEAD"),
        &signature,
        &signature,
        &message,
        &tree,
        &[&previous, &incoming],
    )?;
    repo.cleanup_state()?;
    tracing::debug!(branch, commit = %target, "Merged remote changes");

    Ok(())
}

/// Delete local branches whose `origin/` counterpart no longer exists.
///
/// The checked-out branch is never deleted, so this must run after the
/// requested label has been checked out. Returns the deleted branch names.
pub fn delete_untracked_branches(repo: &Repository) -> Result<Vec<String>> {
    let prefix = format!("{ORIGIN}/");
    let mut remote = HashSet::new();
    for entry in repo.branches(Some(BranchType::Remote))? {
        let (branch, _) = entry?;
        if let Some(name) = branch.name()?
            && let Some(short) = name.strip_prefix(&prefix)
            && short != "HEAD"
        {
            remote.insert(short.to_string());
        }
    }

    let current = current_branch(repo);
    let mut stale = Vec::new();
    for entry in repo.branches(Some(BranchType::Local))? {
        let (branch, _) = entry?;
        if let Some(name) = branch.name()?
            && !remote.contains(name)
            && current.as_deref() != Some(name)
        {
            stale.push(name.to_string());
        }
    }

    let mut deleted = Vec::new();
    for name in stale {
        let result = repo
            .find_branch(&name, BranchType::Local)
            .and_then(|mut branch| branch.delete());
        match result {
            Ok(()) => {
                tracing::info!(branch = %name, "Deleted branch missing from remote");
                deleted.push(name);
            }
            Err(e) => {
                tracing::warn!(branch = %name, error = %e, "Failed to delete untracked branch");
            }
        }
    }

    Ok(deleted)
}
