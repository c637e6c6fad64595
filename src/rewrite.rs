// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Content rewriting.
//!
//! Once the checkout is narrowed down to the design system sub-tree, some
//! content still points at articles that are no longer on disk. Asciidoc
//! cross-references like `<<{articles}/theming/buttons,Buttons>>` only
//! resolve when the target article is part of the build, so they are turned
//! into absolute links against the published documentation instead.

use regex::{Captures, Regex};
use std::borrow::Cow;

/// Published location of theming articles.
pub const THEMING_LINK_BASE: &str = "http://vaadin.com/docs-beta/latest/theming/";

// Greedy on purpose: the label runs up to the last comma on the line.
const THEMING_XREF_PATTERN: &str = r"<<\{articles\}/theming/(.*),(.*)>>";

/// Replace first occurrence of a title line.
///
/// Content without the title line is returned untouched.
pub fn retitle<'a>(content: &'a str, from: &str, to: &str) -> Cow<'a, str> {
    if content.contains(from) {
        Cow::Owned(content.replacen(from, to, 1))
    } else {
        Cow::Borrowed(content)
    }
}

/// Rewrite theming cross-references into absolute links.
#[derive(Debug, Clone)]
pub struct CrossRefRewriter {
    pattern: Regex,
    link_base: String,
}

impl CrossRefRewriter {
    /// Construct new rewriter whose links start with target base URL.
    ///
    /// # Errors
    ///
    /// - Return [`RewriteError::Pattern`] if cross-reference pattern cannot
    ///   be compiled.
    pub fn new(link_base: impl Into<String>) -> Result<Self> {
        Ok(Self {
            pattern: Regex::new(THEMING_XREF_PATTERN)?,
            link_base: link_base.into(),
        })
    }

    /// Count theming cross-references in content.
    pub fn count(&self, content: &str) -> usize {
        self.pattern.find_iter(content).count()
    }

    /// Replace every theming cross-reference with an absolute link.
    ///
    /// Each match keeps its own path and label, so two references to the
    /// same article with different labels stay distinct.
    pub fn rewrite<'a>(&self, content: &'a str) -> Cow<'a, str> {
        self.pattern.replace_all(content, |caps: &Captures<'_>| {
            format!("link:{}{}[{}]", self.link_base, &caps[1], &caps[2])
        })
    }
}

/// Content rewriting error types.
#[derive(Debug, thiserror::Error)]
pub enum RewriteError {
    /// Cross-reference pattern does not compile.
    #[error(transparent)]
    Pattern(#[from] regex::Error),
}

/// Friendly result alias :3
pub type Result<T, E = RewriteError> = std::result::Result<T, E>;
