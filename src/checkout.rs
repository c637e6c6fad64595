// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Repository checkout access.
//!
//! Everything dsinit needs from version control goes through the [`Checkout`]
//! trait: flipping sparse checkout on or off, and asking Git to bring the work
//! tree in line with the current sparsity rules. The configurator itself never
//! talks to Git directly.
//!
//! # Materialization
//!
//! Writing sparsity rules does nothing to the work tree by itself. Git only
//! adds or removes files once the index is re-read against a commit. We do
//! this through `git read-tree -m -u HEAD`, which merges HEAD into the index,
//! applies the skip-worktree bits from the sparsity rules, and updates the work
//! tree to match. Local modifications to files that stay in the checkout are
//! left alone, which is what lets the configurator rewrite tracked files
//! before materializing.
//!
//! libgit2 has no notion of sparse checkout, and does not follow the
//! worktree scoped config that `git sparse-checkout` writes. So the sparse
//! checkout switch, materialization, and the `sparse-checkout` porcelain are
//! handled by the Git binary. Repository discovery and tree walks are done
//! in-process through libgit2.
//!
//! # See Also
//!
//! 1. [`sparse`]
//! 2. [Man page read-tree](https://git-scm.com/docs/git-read-tree)

pub mod sparse;

use git2::{ObjectType, Repository};
use std::{
    collections::VecDeque,
    ffi::{OsStr, OsString},
    path::{Path, PathBuf},
    process::Command,
};
use tracing::{debug, info, instrument};

/// Version control operations needed to narrow or restore a checkout.
pub trait Checkout {
    /// Path to the gitdir of the repository.
    fn gitdir(&self) -> &Path;

    /// Path to the top of the work tree.
    fn work_tree(&self) -> &Path;

    /// Check if sparse checkout is switched on.
    fn is_sparse(&self) -> Result<bool>;

    /// Switch sparse checkout on.
    fn enable_sparse(&self) -> Result<()>;

    /// Switch sparse checkout off.
    fn disable_sparse(&self) -> Result<()>;

    /// Update work tree to match current sparsity rules and HEAD.
    fn materialize(&self) -> Result<()>;

    /// List every file tracked by HEAD relative to the work tree.
    fn list_tracked_files(&self) -> Result<Vec<PathBuf>>;
}

/// Checkout access through libgit2 and the Git binary.
pub struct Git2Checkout {
    repository: Repository,
    work_tree: PathBuf,
}

impl Git2Checkout {
    /// Open repository that contains target path.
    ///
    /// Searches upward from the path for a gitdir like Git itself does.
    ///
    /// # Errors
    ///
    /// - Return [`CheckoutError::Git2`] if no repository can be found.
    /// - Return [`CheckoutError::BareRepository`] if repository has no work
    ///   tree to narrow.
    #[instrument(skip(path), level = "debug")]
    pub fn discover(path: impl AsRef<Path>) -> Result<Self> {
        debug!("discover repository from {:?}", path.as_ref().display());
        let repository = Repository::discover(path.as_ref())?;
        let work_tree = repository
            .workdir()
            .map(Path::to_path_buf)
            .ok_or_else(|| CheckoutError::BareRepository(repository.path().to_path_buf()))?;

        Ok(Self {
            repository,
            work_tree,
        })
    }

    fn is_empty(&self) -> bool {
        self.repository
            .head()
            .ok()
            .and_then(|head| head.target())
            .and_then(|oid| self.repository.find_commit(oid).ok())
            .is_none()
    }

    fn expand_bin_args(
        &self,
        args: impl IntoIterator<Item = impl Into<OsString>>,
    ) -> Vec<OsString> {
        let mut bin_args: Vec<OsString> = vec![
            "--git-dir".into(),
            self.repository.path().as_os_str().to_owned(),
            "--work-tree".into(),
            self.work_tree.as_os_str().to_owned(),
        ];
        bin_args.extend(args.into_iter().map(Into::into));

        bin_args
    }

    fn gitcall(&self, args: impl IntoIterator<Item = impl Into<OsString>>) -> Result<String> {
        syscall_non_interactive("git", self.expand_bin_args(args))
    }
}

impl Checkout for Git2Checkout {
    fn gitdir(&self) -> &Path {
        self.repository.path()
    }

    fn work_tree(&self) -> &Path {
        self.work_tree.as_path()
    }

    // INVARIANT: Ask Git itself, since `git sparse-checkout disable` may leave
    //   its answer in `$gitdir/config.worktree`.
    fn is_sparse(&self) -> Result<bool> {
        let output = self.gitcall([
            "config",
            "--type=bool",
            "--default=false",
            "--get",
            "core.sparseCheckout",
        ])?;

        Ok(parse_stdout_bool(&output))
    }

    #[instrument(skip(self), level = "debug")]
    fn enable_sparse(&self) -> Result<()> {
        info!("enable sparse checkout in {:?}", self.gitdir().display());

        // INVARIANT: Write worktree scoped values.
        //   - Git reads `$gitdir/config.worktree` after `$gitdir/config` once
        //     `extensions.worktreeConfig` is set, and falls back to the local
        //     config otherwise.
        self.gitcall(["config", "--worktree", "core.sparseCheckout", "true"])?;
        self.gitcall(["config", "--worktree", "core.sparseCheckoutCone", "false"])?;

        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    fn disable_sparse(&self) -> Result<()> {
        info!("disable sparse checkout in {:?}", self.gitdir().display());
        let output = self.gitcall(["sparse-checkout", "disable"])?;
        if !output.is_empty() {
            debug!("{output}");
        }

        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    fn materialize(&self) -> Result<()> {
        info!("materialize work tree at {:?}", self.work_tree.display());
        let output = self.gitcall(["read-tree", "-m", "-u", "HEAD"])?;
        if !output.is_empty() {
            debug!("{output}");
        }

        Ok(())
    }

    // Thank you Eric at https://www.hydrogen18.com/blog/list-all-files-git-repo-pygit2.html.
    fn list_tracked_files(&self) -> Result<Vec<PathBuf>> {
        if self.is_empty() {
            return Ok(Vec::new());
        }

        let mut entries = Vec::new();
        let commit = self.repository.head()?.peel_to_commit()?;
        let tree = commit.tree()?;
        let mut trees_and_paths = VecDeque::new();
        trees_and_paths.push_front((tree, PathBuf::new()));

        // Use DFS to traverse commit tree.
        while let Some((tree, path)) = trees_and_paths.pop_front() {
            for tree_entry in &tree {
                match tree_entry.kind() {
                    // INVARIANT: Hit a tree? Traverse it!
                    Some(ObjectType::Tree) => {
                        let next_tree = self.repository.find_tree(tree_entry.id())?;
                        let next_path = path.join(bytes_to_path(tree_entry.name_bytes()));
                        trees_and_paths.push_front((next_tree, next_path));
                    }
                    // INVARIANT: Hit a blob? Record our current path!
                    Some(ObjectType::Blob) => {
                        entries.push(path.join(bytes_to_path(tree_entry.name_bytes())));
                    }
                    _ => continue,
                }
            }
        }

        Ok(entries)
    }
}

fn syscall_non_interactive(
    cmd: impl AsRef<OsStr>,
    args: impl IntoIterator<Item = impl AsRef<OsStr>>,
) -> Result<String> {
    let args = args
        .into_iter()
        .map(|arg| arg.as_ref().to_owned())
        .collect::<Vec<_>>();
    let command = std::iter::once(cmd.as_ref())
        .chain(args.iter().map(OsString::as_os_str))
        .map(OsStr::to_string_lossy)
        .collect::<Vec<_>>()
        .join(" ");

    debug!("run {command}");
    let output = Command::new(cmd.as_ref())
        .args(&args)
        .output()
        .map_err(|err| CheckoutError::Spawn {
            source: err,
            command: command.clone(),
        })?;
    let stdout = String::from_utf8_lossy(output.stdout.as_slice()).into_owned();
    let stderr = String::from_utf8_lossy(output.stderr.as_slice()).into_owned();
    let mut message = String::new();

    if !stdout.is_empty() {
        message.push_str(format!("stdout: {stdout}").as_str());
    }

    if !stderr.is_empty() {
        message.push_str(format!("stderr: {stderr}").as_str());
    }

    // INVARIANT: Chomp trailing newlines.
    let message = message
        .strip_suffix("\r\n")
        .or(message.strip_suffix('\n'))
        .map(ToString::to_string)
        .unwrap_or(message);

    if !output.status.success() {
        return Err(CheckoutError::Syscall { command, message });
    }

    Ok(message)
}

fn parse_stdout_bool(output: &str) -> bool {
    output
        .strip_prefix("stdout: ")
        .and_then(|stdout| stdout.lines().next())
        .is_some_and(|value| value.trim() == "true")
}

// Thanks from:
//
// https://github.com/rust-lang/git2-rs/blob/5bc3baa9694a94db2ca9cc256b5bce8a215f9013/
// src/util.rs#L85
#[cfg(unix)]
fn bytes_to_path(bytes: &[u8]) -> PathBuf {
    use std::os::unix::prelude::*;
    PathBuf::from(OsStr::from_bytes(bytes))
}
#[cfg(windows)]
fn bytes_to_path(bytes: &[u8]) -> PathBuf {
    PathBuf::from(String::from_utf8_lossy(bytes).into_owned())
}

/// Checkout access error types.
#[derive(Debug, thiserror::Error)]
pub enum CheckoutError {
    /// Operations from libgit2 fail.
    #[error(transparent)]
    Git2(#[from] git2::Error),

    /// Repository has no work tree.
    #[error("repository at {:?} is bare, nothing to check out", .0.display())]
    BareRepository(PathBuf),

    /// External command could not be started.
    #[error("failed to run {command:?}")]
    Spawn {
        #[source]
        source: std::io::Error,
        command: String,
    },

    /// External command exited with failure.
    #[error("command {command:?} failed:\n{message}")]
    Syscall { command: String, message: String },
}

/// Friendly result alias :3
pub type Result<T, E = CheckoutError> = std::result::Result<T, E>;
