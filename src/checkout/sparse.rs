// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Sparse checkout rule handling.
//!
//! Utilities to manage the sparsity rules that narrow a documentation checkout
//! down to a single article sub-tree.
//!
//! # Why Sparse Checkout?
//!
//! Git comes with a feature called __sparse checkout__. It allows the user to
//! reduce their work tree to a subset of tracked files. What gets included in
//! this reduced work tree is determined by a set of __sparsity rules__. A
//! sparsity rule is just a pattern of characters that match tracked files for
//! inclusion into the reduced work tree. The syntax of a sparsity rule is the
//! same as the gitignore syntax, with the exception that the semantics are
//! inverted. Thus, unlike gitignore semantics, sparsity semantics do not
//! include any tracked files by default such that each sparsity rule
//! determines what to _include_, and a leading '!' determines what to exclude.
//!
//! The documentation corpus is large, but the design system publisher only
//! needs `articles/ds` plus the top-level build files. Narrowing the checkout
//! keeps the publisher from indexing articles it will never render.
//!
//! # Sparse Checkout Configuration File Layout
//!
//! Sparsity rules are stored in the gitdir at `$gitdir/info/sparse-checkout`.
//! Git interprets sparsity rules on a per line basis, and the _last_ rule that
//! matches a path decides its fate. Hence, unlike gitignore files that people
//! tend to sort, rule order here is part of the meaning of the file.
//!
//! Rules are always written in non-cone mode, because the rule set mixes
//! directory includes with single file excludes.
//!
//! # See Also
//!
//! - [Man page sparse checkout](https://git-scm.com/docs/git-sparse-checkout)

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    fs::{create_dir_all, read_to_string, remove_file, write},
    io::ErrorKind,
    path::{Path, PathBuf},
    str::FromStr,
};

/// Manage sparsity rules in sparse checkout file.
///
/// Provides methods to read, write, remove, and match sparsity rules to target
/// file paths.
#[derive(Clone, Debug)]
pub struct SparsityDrafter<M = InvertedGitignore>
where
    M: SparsityMatcher,
{
    sparse_path: PathBuf,
    matcher: M,
}

impl<M> SparsityDrafter<M>
where
    M: SparsityMatcher,
{
    /// Construct new sparsity rule drafter for target gitdir.
    ///
    /// Does not touch the file system. The sparse checkout configuration file
    /// is only created once rules are written.
    pub fn new(gitdir: impl Into<PathBuf>, matcher: M) -> Self {
        Self {
            sparse_path: gitdir.into().join("info").join("sparse-checkout"),
            matcher,
        }
    }

    /// Path to sparse checkout configuration file.
    pub fn sparse_path(&self) -> &Path {
        self.sparse_path.as_path()
    }

    /// Check if sparse checkout configuration file exists.
    pub fn exists(&self) -> bool {
        self.sparse_path.exists()
    }

    /// Replace entire sparse checkout configuration file with new rule set.
    ///
    /// # Errors
    ///
    /// - Return [`SparseError::CreateSparseFile`] if the `info` directory of
    ///   the gitdir cannot be created.
    /// - Return [`SparseError::WriteSparseFile`] if rules cannot be written.
    pub fn write_rules(&self, rules: &SparsityRules) -> Result<()> {
        // INVARIANT: Fresh clones may lack `$gitdir/info`.
        if let Some(parent) = self.sparse_path.parent() {
            create_dir_all(parent).map_err(|err| SparseError::CreateSparseFile {
                source: err,
                sparse_path: self.sparse_path.clone(),
            })?;
        }

        write(&self.sparse_path, rules.to_string().as_bytes()).map_err(|err| {
            SparseError::WriteSparseFile {
                source: err,
                sparse_path: self.sparse_path.clone(),
            }
        })
    }

    /// List current sparsity rule set.
    ///
    /// A missing sparse checkout configuration file yields an empty rule set.
    ///
    /// # Errors
    ///
    /// - Return [`SparseError::ReadSparseFile`] if sparse checkout
    ///   configuration file exists but cannot be read.
    pub fn current_rules(&self) -> Result<SparsityRules> {
        match read_to_string(&self.sparse_path) {
            Ok(content) => Ok(SparsityRules::from(content.as_str())),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(SparsityRules::default()),
            Err(err) => Err(SparseError::ReadSparseFile {
                source: err,
                sparse_path: self.sparse_path.clone(),
            }),
        }
    }

    /// Remove sparse checkout configuration file.
    ///
    /// Removing a file that does not exist is not an error.
    ///
    /// # Errors
    ///
    /// - Return [`SparseError::RemoveSparseFile`] if file exists but cannot
    ///   be removed.
    pub fn remove(&self) -> Result<()> {
        match remove_file(&self.sparse_path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(SparseError::RemoveSparseFile {
                source: err,
                sparse_path: self.sparse_path.clone(),
            }),
        }
    }

    /// Select the paths that current sparsity rules would materialize.
    ///
    /// Paths are expected to be relative to the top of the work tree.
    ///
    /// # Errors
    ///
    /// - Return [`SparseError::ReadSparseFile`] if current rules cannot be
    ///   read.
    /// - Return [`SparseError::Matcher`] if a rule cannot be parsed.
    pub fn materialized_paths(
        &self,
        work_tree: &Path,
        paths: impl IntoIterator<Item = PathBuf>,
    ) -> Result<Vec<PathBuf>> {
        let rules = self.current_rules()?;
        self.matcher.materialized_paths(work_tree, &rules, paths)
    }
}

/// Ordered listing of sparsity rules.
///
/// # Invariant
///
/// - Rules keep the order they were given in.
/// - Blank lines and surrounding whitespace are never kept.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SparsityRules {
    rules: Vec<String>,
}

impl SparsityRules {
    /// Construct new empty rule listing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a sparsity rule to end of listing.
    pub fn push(&mut self, rule: impl Into<String>) {
        let rule = rule.into();
        let rule = rule.trim();
        if !rule.is_empty() {
            self.rules.push(rule.to_owned());
        }
    }

    /// Iterate over rules in order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(String::as_str)
    }

    /// Number of rules in listing.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Check if listing has no rules.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl<S> FromIterator<S> for SparsityRules
where
    S: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut rules = Self::new();
        for rule in iter {
            rules.push(rule);
        }
        rules
    }
}

impl Display for SparsityRules {
    fn fmt(&self, fmt: &mut Formatter) -> FmtResult {
        for rule in &self.rules {
            writeln!(fmt, "{rule}")?;
        }

        Ok(())
    }
}

impl From<&str> for SparsityRules {
    fn from(content: &str) -> Self {
        content.trim().lines().collect()
    }
}

impl FromStr for SparsityRules {
    type Err = std::convert::Infallible;

    fn from_str(content: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self::from(content))
    }
}

/// Match sparsity rules.
///
/// Model ways to decide which tracked paths a rule set materializes.
pub trait SparsityMatcher {
    /// Filter paths down to those that rules would materialize.
    ///
    /// # Errors
    ///
    /// - Return [`SparseError::Matcher`] if a rule cannot be parsed.
    fn materialized_paths(
        &self,
        work_tree: &Path,
        rules: &SparsityRules,
        paths: impl IntoIterator<Item = PathBuf>,
    ) -> Result<Vec<PathBuf>>;
}

/// A sparsity rule matcher that inverts gitignore semantics.
///
/// Takes a gitignore rule parser, and inverts incoming patterns to match
/// sparsity patterns instead. Ignoring everything first, then flipping the
/// meaning of '!' for every rule keeps Git's last-match-wins ordering intact.
#[derive(Clone, Debug, Default)]
pub struct InvertedGitignore;

impl InvertedGitignore {
    /// Construct new inverted gitignore matcher.
    pub fn new() -> Self {
        Self
    }

    fn build(&self, work_tree: &Path, rules: &SparsityRules) -> Result<Gitignore> {
        let mut builder = GitignoreBuilder::new(work_tree);

        // INVARIANT: Invert gitignore logic.
        //   - Ignore everything by default.
        //   - Invert '!' to mean to unignore.
        //   - Invert any rule without '!' to mean ignore.
        //   - Extend every pattern to cover the contents of a matching
        //     directory, since Git applies sparsity to files only.
        builder.add_line(None, "/*")?;
        for rule in rules.iter() {
            let is_negated = rule.starts_with('!');
            let pattern = rule.trim_start_matches('!');
            let contents = if pattern.ends_with('/') {
                format!("{pattern}**")
            } else {
                format!("{pattern}/**")
            };

            if is_negated {
                builder.add_line(None, pattern)?;
                builder.add_line(None, &contents)?;
            } else {
                builder.add_line(None, &format!("!{pattern}"))?;
                builder.add_line(None, &format!("!{contents}"))?;
            }
        }

        Ok(builder.build()?)
    }
}

impl SparsityMatcher for InvertedGitignore {
    fn materialized_paths(
        &self,
        work_tree: &Path,
        rules: &SparsityRules,
        paths: impl IntoIterator<Item = PathBuf>,
    ) -> Result<Vec<PathBuf>> {
        let matcher = self.build(work_tree, rules)?;

        Ok(paths
            .into_iter()
            .filter(|path| !matcher.matched_path_or_any_parents(path, false).is_ignore())
            .collect())
    }
}

/// Sparsity rule management error types.
#[derive(Debug, thiserror::Error)]
pub enum SparseError {
    /// Directory for sparse configuration file cannot be created.
    #[error("failed to create sparse file at {:?}", sparse_path.display())]
    CreateSparseFile {
        #[source]
        source: std::io::Error,
        sparse_path: PathBuf,
    },

    /// Sparse configuration file cannot be read from.
    #[error("failed to read from sparse file at {:?}", sparse_path.display())]
    ReadSparseFile {
        #[source]
        source: std::io::Error,
        sparse_path: PathBuf,
    },

    /// Sparse configuration file cannot be written to.
    #[error("failed to write to sparse file at {:?}", sparse_path.display())]
    WriteSparseFile {
        #[source]
        source: std::io::Error,
        sparse_path: PathBuf,
    },

    /// Sparse configuration file cannot be removed.
    #[error("failed to remove sparse file at {:?}", sparse_path.display())]
    RemoveSparseFile {
        #[source]
        source: std::io::Error,
        sparse_path: PathBuf,
    },

    /// Sparsity rule cannot be turned into a matcher.
    #[error(transparent)]
    Matcher(#[from] ignore::Error),
}

/// Friendly result alias :3
pub type Result<T, E = SparseError> = std::result::Result<T, E>;
