// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! Specify the layout of the documentation repository that dsinit narrows.
//! Every setting has a default that matches the documentation corpus, so no
//! configuration file is needed in the common case. A layout file can be used
//! to point dsinit at a different sub-tree or a relocated publisher.
//!
//! All relative paths are resolved against the top of the work tree by the
//! caller.

use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Error as FmtError, Formatter, Result as FmtResult},
    fs::read_to_string,
    path::{Path, PathBuf},
    str::FromStr,
};

/// Default name of layout file looked up at the top of the work tree.
pub const LAYOUT_FILE_NAME: &str = "dsinit.toml";

/// Repository layout.
///
/// # General Layout
///
/// A layout is composed of three parts. The publisher section describes the
/// environment files handed to the publisher tool. The pages section names the
/// content files that get derived or rewritten. The sparsity section lists the
/// sparsity rules that narrow the checkout.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Layout {
    /// Environment declarations for the publisher.
    pub publisher: PublisherSettings,

    /// Content files to derive or rewrite.
    pub pages: PageSettings,

    /// Rules to narrow the checkout with.
    pub sparsity: SparsitySettings,
}

impl Layout {
    /// Load layout from file, or fall back to defaults.
    ///
    /// An explicit path must exist. Without one, [`LAYOUT_FILE_NAME`] is
    /// looked up at the top of the work tree, and defaults are used if it is
    /// missing.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::Read`] if layout file cannot be read.
    /// - Return [`ConfigError::Deserialize`] if layout file is malformed.
    /// - Return [`ConfigError::ShellExpansion`] if a path cannot be expanded.
    pub fn load(explicit: Option<&Path>, work_tree: &Path) -> Result<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => {
                let path = work_tree.join(LAYOUT_FILE_NAME);
                if !path.exists() {
                    return Ok(Self::default());
                }
                path
            }
        };

        read_to_string(&path)
            .map_err(|err| ConfigError::Read {
                source: err,
                path: path.clone(),
            })?
            .parse()
    }
}

impl FromStr for Layout {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let mut layout: Layout = toml::from_str(data)?;

        // INVARIANT: Perform shell expansion on every path field.
        let pages = &mut layout.pages;
        for path in [
            &mut pages.overview,
            &mut pages.index,
            &mut pages.error_page,
            &mut pages.error_page_copy,
            &mut pages.shared_fragment,
        ] {
            *path = expand_path(path)?;
        }

        for path in layout.publisher.env_files.iter_mut() {
            *path = expand_path(path)?;
        }

        Ok(layout)
    }
}

impl Display for Layout {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(
            toml::to_string_pretty(self)
                .map_err(ConfigError::Serialize)?
                .as_str(),
        )
    }
}

fn expand_path(path: &Path) -> Result<PathBuf> {
    Ok(PathBuf::from(
        shellexpand::full(path.to_string_lossy().as_ref())?.into_owned(),
    ))
}

/// Publisher environment settings.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PublisherSettings {
    /// Article sub-tree the publisher should render.
    pub articles_path: String,

    /// Environment files that declare the article sub-tree.
    pub env_files: Vec<PathBuf>,
}

impl PublisherSettings {
    /// Environment declaration line written to every env file.
    pub fn env_line(&self) -> String {
        format!("DOCS_ARTICLES_PATH=\"{}\"\n", self.articles_path)
    }
}

impl Default for PublisherSettings {
    fn default() -> Self {
        Self {
            articles_path: "articles/ds".into(),
            env_files: vec![
                PathBuf::from("dspublisher/build/.env"),
                PathBuf::from("dspublisher/develop/.env"),
            ],
        }
    }
}

/// Content page settings.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PageSettings {
    /// Overview page that the sub-tree index is derived from.
    pub overview: PathBuf,

    /// Generated sub-tree index page.
    pub index: PathBuf,

    /// Title line of overview page to replace.
    pub overview_title: String,

    /// Title line to use in generated index page.
    pub index_title: String,

    /// Top-level error page.
    pub error_page: PathBuf,

    /// Copy of error page inside the sub-tree.
    pub error_page_copy: PathBuf,

    /// Shared fragment whose theming cross-references become links.
    pub shared_fragment: PathBuf,

    /// Base URL that theming cross-reference paths are appended to.
    pub theming_link_base: String,
}

impl Default for PageSettings {
    fn default() -> Self {
        Self {
            overview: PathBuf::from("articles/ds/overview.asciidoc"),
            index: PathBuf::from("articles/ds/index.asciidoc"),
            overview_title: "title: Overview".into(),
            index_title: "title: Design System".into(),
            error_page: PathBuf::from("articles/404.asciidoc"),
            error_page_copy: PathBuf::from("articles/ds/404.asciidoc"),
            shared_fragment: PathBuf::from("articles/ds/foundation/_shared.asciidoc"),
            theming_link_base: crate::rewrite::THEMING_LINK_BASE.into(),
        }
    }
}

/// Sparsity rule settings.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SparsitySettings {
    /// Sparsity rules in the order Git should apply them.
    pub rules: Vec<String>,
}

impl Default for SparsitySettings {
    fn default() -> Self {
        // INVARIANT: Keep exclusions exactly as the corpus lists them, even
        //   the ones outside of `articles/ds`.
        let rules = [
            "/*",
            "!/articles/*/",
            "/articles/ds",
            "!/articles/_images",
            "!/articles/index.asciidoc",
            "!/articles/vaadin-version.asciidoc",
            "!/articles/ds/overview.asciidoc",
            "!/articles/404.asciidoc",
        ];

        Self {
            rules: rules.into_iter().map(Into::into).collect(),
        }
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read layout file.
    #[error("failed to read layout file at {:?}", path.display())]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Failed to deserialize configuration.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Failed to serialize configuration.
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),

    /// Failed to perform shell expansion on configuration.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),
}

impl From<ConfigError> for FmtError {
    fn from(_: ConfigError) -> Self {
        FmtError
    }
}

/// Friendly result alias :3
type Result<T, E = ConfigError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;
    use std::fs::write;
    use tempfile::TempDir;

    #[test]
    fn empty_layout_uses_defaults() -> anyhow::Result<()> {
        let result: Layout = "".parse()?;
        assert_eq!(result, Layout::default());
        assert_eq!(
            result.publisher.env_line(),
            "DOCS_ARTICLES_PATH=\"articles/ds\"\n"
        );

        Ok(())
    }

    #[sealed_test(env = [("DOCS_ROOT", "/srv/docs")])]
    fn deserialize_partial_layout() -> anyhow::Result<()> {
        let result: Layout = r#"
            [publisher]
            articles_path = "articles/components"
            env_files = ["$DOCS_ROOT/publisher/.env"]

            [pages]
            shared_fragment = "articles/components/_shared.asciidoc"

            [sparsity]
            rules = ["/*", "!/articles/*/", "/articles/components"]
        "#
        .parse()?;

        let expect = Layout {
            publisher: PublisherSettings {
                articles_path: "articles/components".into(),
                env_files: vec![PathBuf::from("/srv/docs/publisher/.env")],
            },
            pages: PageSettings {
                shared_fragment: PathBuf::from("articles/components/_shared.asciidoc"),
                ..PageSettings::default()
            },
            sparsity: SparsitySettings {
                rules: vec!["/*".into(), "!/articles/*/".into(), "/articles/components".into()],
            },
        };

        assert_eq!(result, expect);

        Ok(())
    }

    #[test]
    fn serialized_layout_parses_back() -> anyhow::Result<()> {
        let layout = Layout::default();
        let result: Layout = layout.to_string().parse()?;
        assert_eq!(result, layout);

        Ok(())
    }

    #[test]
    fn load_falls_back_to_defaults() -> anyhow::Result<()> {
        let work_tree = TempDir::new()?;
        assert_eq!(Layout::load(None, work_tree.path())?, Layout::default());

        write(
            work_tree.path().join(LAYOUT_FILE_NAME),
            "[publisher]\narticles_path = \"articles/flow\"\n",
        )?;
        let result = Layout::load(None, work_tree.path())?;
        assert_eq!(result.publisher.articles_path, "articles/flow");

        let missing = work_tree.path().join("missing.toml");
        let result = Layout::load(Some(&missing), work_tree.path());
        assert!(matches!(result, Err(ConfigError::Read { .. })));

        Ok(())
    }
}
