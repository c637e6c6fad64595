// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Checkout configuration.
//!
//! The configurator narrows a documentation checkout down to the design
//! system sub-tree, or restores the full checkout afterwards. It runs in one
//! of two modes.
//!
//! # Setup
//!
//! 1. Switch sparse checkout on.
//! 2. Replace sparsity rules with the ones from the layout.
//! 3. Write the publisher environment files.
//! 4. Derive the sub-tree index page from the overview page.
//! 5. Copy the top-level error page into the sub-tree.
//! 6. Turn theming cross-references of the shared fragment into links.
//! 7. Materialize the narrowed work tree.
//!
//! # Teardown
//!
//! 1. Switch sparse checkout off.
//! 2. Remove the sparse checkout configuration file.
//! 3. Materialize the full work tree.
//!
//! Steps run in order and the first failure stops the run. Nothing is rolled
//! back, so earlier steps stay applied. Every file is overwritten on each run,
//! which makes running setup twice the same as running it once.

use crate::{
    checkout::{
        sparse::{InvertedGitignore, SparsityDrafter, SparsityRules},
        Checkout, Git2Checkout,
    },
    config::Layout,
    rewrite::{retitle, CrossRefRewriter},
};

use std::{
    ffi::OsStr,
    fmt::{Display, Formatter, Result as FmtResult},
    fs::{copy, create_dir_all, read_to_string, write},
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument, warn};

/// Environment flag that selects teardown mode when set.
pub const UNDO_FLAG: &str = "DOCS_INIT_UNDO";

/// Mode of operation for the configurator.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Narrow checkout down to the design system sub-tree.
    #[default]
    Setup,

    /// Restore full checkout.
    Teardown,
}

impl Mode {
    /// Select mode from value of the undo flag.
    ///
    /// Any non-empty value means teardown. Unset or empty means setup.
    pub fn from_flag(value: Option<impl AsRef<OsStr>>) -> Self {
        match value {
            Some(value) if !value.as_ref().is_empty() => Self::Teardown,
            _ => Self::Setup,
        }
    }

    /// Select mode from [`UNDO_FLAG`] in process environment.
    pub fn from_env() -> Self {
        Self::from_flag(std::env::var_os(UNDO_FLAG))
    }
}

impl Display for Mode {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Setup => fmt.write_str("setup"),
            Self::Teardown => fmt.write_str("teardown"),
        }
    }
}

/// Narrow or restore a documentation checkout.
pub struct Configurator<C = Git2Checkout>
where
    C: Checkout,
{
    checkout: C,
    layout: Layout,
    sparsity: SparsityDrafter<InvertedGitignore>,
}

impl<C> Configurator<C>
where
    C: Checkout,
{
    /// Construct new configurator over target checkout.
    pub fn new(checkout: C, layout: Layout) -> Self {
        let sparsity = SparsityDrafter::new(checkout.gitdir(), InvertedGitignore::new());
        Self {
            checkout,
            layout,
            sparsity,
        }
    }

    /// Run configurator in target mode.
    ///
    /// # Errors
    ///
    /// - Return [`ConfiguratorError`] for the first step that fails.
    pub fn run(&self, mode: Mode) -> Result<()> {
        info!("run {mode} in {:?}", self.checkout.work_tree().display());
        match mode {
            Mode::Setup => self.setup(),
            Mode::Teardown => self.teardown(),
        }
    }

    /// Narrow checkout down to the design system sub-tree.
    ///
    /// # Errors
    ///
    /// - Return [`ConfiguratorError::Checkout`] if Git operations fail.
    /// - Return [`ConfiguratorError::Sparse`] if sparsity rules cannot be
    ///   written.
    /// - Return [`ConfiguratorError::Read`], [`ConfiguratorError::Write`],
    ///   or [`ConfiguratorError::Copy`] if content files cannot be handled.
    #[instrument(skip(self), level = "debug")]
    pub fn setup(&self) -> Result<()> {
        self.checkout.enable_sparse()?;

        let rules = self.layout.sparsity.rules.iter().collect::<SparsityRules>();
        debug!("write {} sparsity rules", rules.len());
        self.sparsity.write_rules(&rules)?;

        self.write_env_files()?;
        self.write_index_page()?;
        self.copy_error_page()?;
        self.rewrite_shared_fragment()?;

        self.checkout.materialize()?;

        Ok(())
    }

    /// Restore full checkout.
    ///
    /// # Errors
    ///
    /// - Return [`ConfiguratorError::Checkout`] if Git operations fail.
    /// - Return [`ConfiguratorError::Sparse`] if sparse checkout
    ///   configuration file cannot be removed.
    #[instrument(skip(self), level = "debug")]
    pub fn teardown(&self) -> Result<()> {
        self.checkout.disable_sparse()?;

        if !self.sparsity.exists() {
            debug!("no sparse file at {:?}", self.sparsity.sparse_path().display());
        }
        self.sparsity.remove()?;

        self.checkout.materialize()?;

        Ok(())
    }

    /// Summarize current state of the checkout.
    ///
    /// # Errors
    ///
    /// - Return [`ConfiguratorError::Checkout`] if Git operations fail.
    /// - Return [`ConfiguratorError::Sparse`] if sparsity rules cannot be
    ///   read or matched.
    pub fn status(&self) -> Result<Status> {
        let sparse = self.checkout.is_sparse()?;
        let rules = self.sparsity.current_rules()?;
        let tracked = self.checkout.list_tracked_files()?;
        let total = tracked.len();

        // INVARIANT: Git ignores the sparse file unless sparse checkout is on.
        let materialized = if sparse {
            self.sparsity
                .materialized_paths(self.checkout.work_tree(), tracked)?
                .len()
        } else {
            total
        };

        Ok(Status {
            work_tree: self.checkout.work_tree().to_path_buf(),
            sparse,
            rules,
            materialized,
            tracked: total,
        })
    }

    fn work_tree_path(&self, path: &Path) -> PathBuf {
        self.checkout.work_tree().join(path)
    }

    fn write_env_files(&self) -> Result<()> {
        let line = self.layout.publisher.env_line();
        for env_file in &self.layout.publisher.env_files {
            write_file(&self.work_tree_path(env_file), &line)?;
        }

        Ok(())
    }

    fn write_index_page(&self) -> Result<()> {
        let pages = &self.layout.pages;
        let overview = read_file(&self.work_tree_path(&pages.overview))?;
        if !overview.contains(&pages.overview_title) {
            warn!(
                "no {:?} line in {:?}, index page is a plain copy",
                pages.overview_title,
                pages.overview.display()
            );
        }

        let index = retitle(&overview, &pages.overview_title, &pages.index_title);
        write_file(&self.work_tree_path(&pages.index), &index)
    }

    fn copy_error_page(&self) -> Result<()> {
        let pages = &self.layout.pages;
        copy_file(
            &self.work_tree_path(&pages.error_page),
            &self.work_tree_path(&pages.error_page_copy),
        )
    }

    fn rewrite_shared_fragment(&self) -> Result<()> {
        let pages = &self.layout.pages;
        let path = self.work_tree_path(&pages.shared_fragment);
        let content = read_file(&path)?;

        let rewriter = CrossRefRewriter::new(pages.theming_link_base.as_str())?;
        info!(
            "rewrite {} theming cross-references in {:?}",
            rewriter.count(&content),
            pages.shared_fragment.display()
        );

        write_file(&path, &rewriter.rewrite(&content))
    }
}

fn read_file(path: &Path) -> Result<String> {
    debug!("read {:?}", path.display());
    read_to_string(path).map_err(|err| ConfiguratorError::Read {
        source: err,
        path: path.to_path_buf(),
    })
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    debug!("write {:?}", path.display());
    let to_error = |err| ConfiguratorError::Write {
        source: err,
        path: path.to_path_buf(),
    };

    if let Some(parent) = path.parent() {
        create_dir_all(parent).map_err(to_error)?;
    }

    write(path, content.as_bytes()).map_err(to_error)
}

fn copy_file(from: &Path, to: &Path) -> Result<()> {
    debug!("copy {:?} to {:?}", from.display(), to.display());
    let to_error = |err| ConfiguratorError::Copy {
        source: err,
        from: from.to_path_buf(),
        to: to.to_path_buf(),
    };

    if let Some(parent) = to.parent() {
        create_dir_all(parent).map_err(to_error)?;
    }

    copy(from, to).map(|_| ()).map_err(to_error)
}

/// Snapshot of checkout state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    /// Top of the work tree.
    pub work_tree: PathBuf,

    /// Whether sparse checkout is switched on.
    pub sparse: bool,

    /// Current sparsity rules.
    pub rules: SparsityRules,

    /// Number of tracked files the rules materialize.
    pub materialized: usize,

    /// Number of tracked files in HEAD.
    pub tracked: usize,
}

impl Display for Status {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        writeln!(fmt, "work tree: {}", self.work_tree.display())?;
        writeln!(
            fmt,
            "sparse checkout: {}",
            if self.sparse { "enabled" } else { "disabled" }
        )?;
        writeln!(fmt, "materialized: {}/{}", self.materialized, self.tracked)?;
        if self.rules.is_empty() {
            return writeln!(fmt, "sparsity rules: none");
        }

        writeln!(fmt, "sparsity rules:")?;
        for rule in self.rules.iter() {
            writeln!(fmt, "    {rule}")?;
        }

        Ok(())
    }
}

/// Configurator error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfiguratorError {
    /// Git operations fail.
    #[error(transparent)]
    Checkout(#[from] crate::checkout::CheckoutError),

    /// Sparse checkout configuration file manipulation fails.
    #[error(transparent)]
    Sparse(#[from] crate::checkout::sparse::SparseError),

    /// Cross-reference rewriter cannot be built.
    #[error(transparent)]
    Rewrite(#[from] crate::rewrite::RewriteError),

    /// Content file cannot be read.
    #[error("failed to read {:?}", path.display())]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Content file cannot be written.
    #[error("failed to write {:?}", path.display())]
    Write {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Content file cannot be copied.
    #[error("failed to copy {:?} to {:?}", from.display(), to.display())]
    Copy {
        #[source]
        source: std::io::Error,
        from: PathBuf,
        to: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = ConfiguratorError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkout::CheckoutError;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;
    use std::{cell::RefCell, fs::create_dir_all};
    use tempfile::TempDir;

    const OVERVIEW: &str = indoc! {r#"
        ---
        title: Overview
        order: 1
        ---

        = Design System
    "#};

    const ERROR_PAGE: &str = "---\ntitle: Page Not Found\n---\n\n= 404\n";

    const SHARED: &str = indoc! {r#"
        :lumo: <<{articles}/theming/lumo,Lumo>>
        :colors: <<{articles}/theming/lumo/colors,Colors>>
    "#};

    /// Checkout that records calls instead of touching Git.
    struct RecordingCheckout {
        gitdir: PathBuf,
        work_tree: PathBuf,
        calls: RefCell<Vec<&'static str>>,
        fail_materialize: bool,
    }

    impl RecordingCheckout {
        fn new(work_tree: &Path) -> Self {
            Self {
                gitdir: work_tree.join(".git"),
                work_tree: work_tree.to_path_buf(),
                calls: RefCell::new(Vec::new()),
                fail_materialize: false,
            }
        }

        fn record(&self, call: &'static str) {
            self.calls.borrow_mut().push(call);
        }
    }

    impl Checkout for RecordingCheckout {
        fn gitdir(&self) -> &Path {
            &self.gitdir
        }

        fn work_tree(&self) -> &Path {
            &self.work_tree
        }

        fn is_sparse(&self) -> crate::checkout::Result<bool> {
            Ok(self.calls.borrow().last() == Some(&"enable_sparse"))
        }

        fn enable_sparse(&self) -> crate::checkout::Result<()> {
            self.record("enable_sparse");
            Ok(())
        }

        fn disable_sparse(&self) -> crate::checkout::Result<()> {
            self.record("disable_sparse");
            Ok(())
        }

        fn materialize(&self) -> crate::checkout::Result<()> {
            self.record("materialize");
            if self.fail_materialize {
                return Err(CheckoutError::Syscall {
                    command: "git read-tree -m -u HEAD".into(),
                    message: "stderr: fatal: not a git repository".into(),
                });
            }
            Ok(())
        }

        fn list_tracked_files(&self) -> crate::checkout::Result<Vec<PathBuf>> {
            Ok([
                "README.md",
                "articles/404.asciidoc",
                "articles/ds/overview.asciidoc",
                "articles/ds/foundation/_shared.asciidoc",
                "articles/flow/routing.asciidoc",
            ]
            .map(PathBuf::from)
            .to_vec())
        }
    }

    fn docs_fixture() -> anyhow::Result<TempDir> {
        let root = TempDir::new()?;
        create_dir_all(root.path().join(".git"))?;
        create_dir_all(root.path().join("articles/ds/foundation"))?;
        write(root.path().join("articles/ds/overview.asciidoc"), OVERVIEW)?;
        write(root.path().join("articles/404.asciidoc"), ERROR_PAGE)?;
        write(
            root.path().join("articles/ds/foundation/_shared.asciidoc"),
            SHARED,
        )?;

        Ok(root)
    }

    fn recording_configurator(root: &Path) -> Configurator<RecordingCheckout> {
        Configurator::new(RecordingCheckout::new(root), Layout::default())
    }

    fn output_files(root: &Path) -> anyhow::Result<Vec<String>> {
        let outputs = [
            ".git/info/sparse-checkout",
            "dspublisher/build/.env",
            "dspublisher/develop/.env",
            "articles/ds/index.asciidoc",
            "articles/ds/404.asciidoc",
            "articles/ds/foundation/_shared.asciidoc",
        ];

        Ok(outputs
            .iter()
            .map(|path| read_to_string(root.join(path)))
            .collect::<std::io::Result<Vec<_>>>()?)
    }

    #[test]
    fn mode_from_flag() {
        assert_eq!(Mode::from_flag(None::<&str>), Mode::Setup);
        assert_eq!(Mode::from_flag(Some("")), Mode::Setup);
        assert_eq!(Mode::from_flag(Some("1")), Mode::Teardown);
        assert_eq!(Mode::from_flag(Some("false")), Mode::Teardown);
    }

    #[sealed_test(env = [("DOCS_INIT_UNDO", "true")])]
    fn mode_from_env_with_flag() {
        assert_eq!(Mode::from_env(), Mode::Teardown);
    }

    #[sealed_test]
    fn mode_from_env_without_flag() {
        std::env::remove_var(UNDO_FLAG);
        assert_eq!(Mode::from_env(), Mode::Setup);
    }

    #[test]
    fn setup_writes_every_output() -> anyhow::Result<()> {
        let root = docs_fixture()?;
        let configurator = recording_configurator(root.path());
        configurator.run(Mode::Setup)?;

        let env_line = "DOCS_ARTICLES_PATH=\"articles/ds\"\n";
        let expect = vec![
            indoc! {r#"
                /*
                !/articles/*/
                /articles/ds
                !/articles/_images
                !/articles/index.asciidoc
                !/articles/vaadin-version.asciidoc
                !/articles/ds/overview.asciidoc
                !/articles/404.asciidoc
            "#}
            .to_string(),
            env_line.to_string(),
            env_line.to_string(),
            OVERVIEW.replacen("title: Overview", "title: Design System", 1),
            ERROR_PAGE.to_string(),
            indoc! {r#"
                :lumo: link:http://vaadin.com/docs-beta/latest/theming/lumo[Lumo]
                :colors: link:http://vaadin.com/docs-beta/latest/theming/lumo/colors[Colors]
            "#}
            .to_string(),
        ];
        assert_eq!(output_files(root.path())?, expect);
        assert_eq!(
            *configurator.checkout.calls.borrow(),
            vec!["enable_sparse", "materialize"]
        );

        Ok(())
    }

    #[test]
    fn setup_twice_is_setup_once() -> anyhow::Result<()> {
        let root = docs_fixture()?;
        let configurator = recording_configurator(root.path());

        configurator.setup()?;
        let first = output_files(root.path())?;
        configurator.setup()?;
        let second = output_files(root.path())?;
        assert_eq!(first, second);

        Ok(())
    }

    #[test]
    fn setup_copies_overview_without_title_line() -> anyhow::Result<()> {
        let root = docs_fixture()?;
        let overview = "---\ntitle: Introduction\n---\n";
        write(root.path().join("articles/ds/overview.asciidoc"), overview)?;

        let configurator = recording_configurator(root.path());
        configurator.setup()?;

        let result = read_to_string(root.path().join("articles/ds/index.asciidoc"))?;
        assert_eq!(result, overview);

        Ok(())
    }

    #[test]
    fn setup_halts_on_missing_overview() -> anyhow::Result<()> {
        let root = docs_fixture()?;
        std::fs::remove_file(root.path().join("articles/ds/overview.asciidoc"))?;

        let configurator = recording_configurator(root.path());
        let result = configurator.setup();
        assert!(matches!(result, Err(ConfiguratorError::Read { .. })));

        // Earlier steps stay applied, later steps never run.
        assert!(root.path().join(".git/info/sparse-checkout").exists());
        assert!(root.path().join("dspublisher/build/.env").exists());
        assert!(!root.path().join("articles/ds/404.asciidoc").exists());
        assert_eq!(
            read_to_string(root.path().join("articles/ds/foundation/_shared.asciidoc"))?,
            SHARED
        );
        assert_eq!(*configurator.checkout.calls.borrow(), vec!["enable_sparse"]);

        Ok(())
    }

    #[test]
    fn setup_surfaces_materialize_failure() -> anyhow::Result<()> {
        let root = docs_fixture()?;
        let mut checkout = RecordingCheckout::new(root.path());
        checkout.fail_materialize = true;

        let configurator = Configurator::new(checkout, Layout::default());
        let result = configurator.setup();
        assert!(matches!(result, Err(ConfiguratorError::Checkout(_))));

        Ok(())
    }

    #[test]
    fn teardown_removes_sparse_file() -> anyhow::Result<()> {
        let root = docs_fixture()?;
        let configurator = recording_configurator(root.path());

        configurator.run(Mode::Setup)?;
        configurator.run(Mode::Teardown)?;
        assert!(!root.path().join(".git/info/sparse-checkout").exists());
        assert_eq!(
            *configurator.checkout.calls.borrow(),
            vec![
                "enable_sparse",
                "materialize",
                "disable_sparse",
                "materialize"
            ]
        );

        // Teardown without prior setup is fine.
        configurator.run(Mode::Teardown)?;
        assert!(!root.path().join(".git/info/sparse-checkout").exists());

        Ok(())
    }

    #[test]
    fn teardown_writes_no_rules() -> anyhow::Result<()> {
        let root = docs_fixture()?;
        let configurator = recording_configurator(root.path());

        configurator.run(Mode::Teardown)?;
        assert!(!root.path().join(".git/info/sparse-checkout").exists());
        assert!(!root.path().join("dspublisher/build/.env").exists());

        Ok(())
    }

    #[test]
    fn status_counts_materialized_files() -> anyhow::Result<()> {
        let root = docs_fixture()?;
        let configurator = recording_configurator(root.path());

        let status = configurator.status()?;
        assert!(!status.sparse);
        assert!(status.rules.is_empty());
        assert_eq!((status.materialized, status.tracked), (5, 5));

        configurator.checkout.enable_sparse()?;
        configurator
            .sparsity
            .write_rules(&configurator.layout.sparsity.rules.iter().collect())?;
        let status = configurator.status()?;
        assert!(status.sparse);
        assert_eq!(status.rules.len(), 8);
        assert_eq!((status.materialized, status.tracked), (2, 5));

        Ok(())
    }
}
