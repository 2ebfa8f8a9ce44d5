// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 dmcodec contributors

mod config;
mod decode;
mod encode;
mod error;
mod info;
mod metrics;
mod utils;

use clap::{Parser, Subcommand, ValueEnum};
use error::result_to_exit_code;
use std::path::PathBuf;
use std::process::ExitCode;

/// dmcodec CLI - Hardware H.264/JPEG encode and decode tool
#[derive(Parser)]
#[command(name = "dmcodec")]
#[command(version)]
#[command(about = "dmcodec CLI - Hardware H.264/JPEG encode and decode tool")]
#[command(long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging (use RUST_LOG=debug for more)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Output metrics in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Codec engine backend
    #[arg(long, global = true, value_enum, default_value_t = Backend::Native)]
    backend: Backend,

    /// JSON file with session settings (command-line flags take precedence)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Where sessions run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    /// The codec engine runtime (DMCODEC_LIBRARY or libdmcodec.so)
    Native,
    /// In-memory engine producing synthetic output, for dry runs
    Mock,
}

/// Options shared by every subcommand.
#[derive(Debug, Clone)]
pub struct Global {
    pub json: bool,
    pub quiet: bool,
    pub backend: Backend,
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode raw NV12 frames to H.264 or JPEG
    Encode(encode::Args),

    /// Decode an H.264 Annex-B stream to raw NV12 frames
    Decode(decode::Args),

    /// Display codec runtime and session capabilities
    Info(info::Args),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbose, cli.quiet);

    let global = Global {
        json: cli.json,
        quiet: cli.quiet,
        backend: cli.backend,
        config: cli.config,
    };

    let result = match cli.command {
        Commands::Encode(args) => encode::execute(args, &global),
        Commands::Decode(args) => decode::execute(args, &global),
        Commands::Info(args) => info::execute(args, &global),
    };

    result_to_exit_code(result)
}

/// Initialize env_logger based on verbosity flags
fn init_logging(verbose: bool, quiet: bool) {
    let env = env_logger::Env::default();

    let env = if quiet {
        env.default_filter_or("error")
    } else if verbose {
        env.default_filter_or("debug")
    } else {
        env.default_filter_or("info")
    };

    env_logger::Builder::from_env(env)
        .format_timestamp(None)
        .format_target(false)
        .init();

    log::debug!("Logging initialized");
}
