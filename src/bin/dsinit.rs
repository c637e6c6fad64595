// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use dsinit::{Checkout, Configurator, Git2Checkout, Layout, Mode};

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::{path::PathBuf, process::exit};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Parser)]
#[command(
    about,
    long_about = "Narrow a documentation checkout down to the design system articles.\n\n\
                  Without a command, setup runs unless DOCS_INIT_UNDO is set to a \
                  non-empty value, in which case teardown runs.",
    override_usage = "dsinit [options] [<command>]",
    subcommand_help_heading = "Commands",
    version
)]
struct Cli {
    /// Path to layout file instead of dsinit.toml at top of work tree.
    #[arg(short, long, value_name = "path")]
    pub config: Option<PathBuf>,

    /// Path inside repository to configure.
    #[arg(short, long, value_name = "path", default_value = ".")]
    pub repo: PathBuf,

    #[command(subcommand)]
    pub command: Option<Command>,
}

impl Cli {
    fn run(self) -> Result<()> {
        let checkout = Git2Checkout::discover(&self.repo)?;
        let layout = Layout::load(self.config.as_deref(), checkout.work_tree())?;
        let configurator = Configurator::new(checkout, layout);

        match self.command {
            Some(Command::Setup) => configurator.run(Mode::Setup)?,
            Some(Command::Teardown) => configurator.run(Mode::Teardown)?,
            Some(Command::Status) => {
                let status = configurator.status()?;
                info!("\n{status}");
            }
            None => configurator.run(Mode::from_env())?,
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Narrow checkout down to design system articles.
    #[command(override_usage = "dsinit [options] setup")]
    Setup,

    /// Restore full checkout.
    #[command(override_usage = "dsinit [options] teardown")]
    Teardown,

    /// Show sparse checkout state of repository.
    #[command(override_usage = "dsinit [options] status")]
    Status,
}

fn main() {
    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .without_time();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    if let Err(error) = Cli::parse().run() {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}
