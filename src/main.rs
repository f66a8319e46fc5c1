//! # gh-pages-publish
//!
//! **gh-pages-publish** pushes a built static site to a git branch from CI.
//!
//! Features:
//! - `gh-pages-publish deploy` publishes the site directory (the CI step)
//! - `gh-pages-publish inputs` prints the resolved inputs and exits
//!
//! Inputs come from flags, from the runner's `INPUT_*` variables, or from a
//! TOML file passed with `--config`.
//!
//! This CLI is built with [clap](https://docs.rs/clap).

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use gh_pages_publish::{InputArgs, annotate_error, cmd_deploy, cmd_inputs};
use std::env;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line interface definition.
///
/// Parsed using `clap` derive macros.
#[derive(Parser, Debug)]
#[command(
    name = "gh-pages-publish",
    version,
    about = "Publish a built static site to a git branch from CI",
    arg_required_else_help = true
)]
struct Cli {
    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    cmd: Option<Cmd>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Cmd {
    /// Publish the site directory to the publish branch
    Deploy(InputArgs),
    /// Print the resolved inputs without publishing
    Inputs(InputArgs),
}

fn init_tracing(verbose: u8) {
    let runner_debug = env::var("RUNNER_DEBUG").is_ok_and(|v| v == "1");
    let level = match verbose {
        0 if runner_debug => "debug",
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .without_time(),
        )
        .init();
}

/// CLI entry point.
///
/// Parses arguments with `clap` and executes the selected subcommand. A
/// failure is also reported as an `::error::` annotation so it shows up on
/// the workflow run summary.
fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match &cli.cmd {
        Some(Cmd::Deploy(args)) => cmd_deploy(args),
        Some(Cmd::Inputs(args)) => cmd_inputs(args),
        None => Ok(()),
    };
    if let Err(e) = &result {
        annotate_error(&format!("{:#}", e));
    }
    result
}
