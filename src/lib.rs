// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Design system checkout configurator.
//!
//! The documentation repository holds every article of the product, but the
//! design system publisher only renders `articles/ds`. Dsinit narrows a local
//! checkout down to that sub-tree through Git's sparse checkout feature, and
//! prepares the handful of files the publisher expects to find there. Running
//! it in teardown mode puts the full checkout back.
//!
//! # See Also
//!
//! 1. [`configurator`]
//! 2. [`checkout::sparse`]
//! 3. [`config::Layout`]

pub mod checkout;
pub mod config;
pub mod configurator;
pub mod rewrite;

pub use checkout::{Checkout, Git2Checkout};
pub use config::Layout;
pub use configurator::{Configurator, Mode, Status};
