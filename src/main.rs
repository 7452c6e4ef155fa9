// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! tsboot CLI - run a TypeScript entry point through the interception loader

use clap::Parser;
use owo_colors::OwoColorize;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use tsboot_loader::{BootRuntime, LoaderConfig, VERSION};

#[derive(Parser)]
#[command(
    name = "tsboot",
    about = "Run TypeScript entry points through an external transpiler",
    version = VERSION,
    author = "Pegasus Heavy Industries"
)]
struct Cli {
    /// Entry script (absolute, or relative to the base directory)
    script: PathBuf,

    /// Configuration file layered over the defaults
    #[arg(long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(long)]
    verbose: bool,

    /// Arguments passed to the script
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(&cli) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("{}: {:#}", "Error".red().bold(), e);
            std::process::exit(1);
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<i32> {
    let config = LoaderConfig::load(cli.config.as_deref())?;
    tracing::debug!("Configuration: {:?}", config);

    let argv = std::iter::once(cli.script.display().to_string())
        .chain(cli.args.iter().cloned())
        .collect();
    let runtime = BootRuntime::new(config, argv)?;
    runtime.install(tsboot_loader::transpiler_from_config(runtime.config()))?;

    Ok(runtime.run_main(&cli.script)?)
}

/// `tsboot=warn` unless `--verbose`; `RUST_LOG` wins when set
fn init_logging(verbose: bool) {
    let default = if verbose {
        "tsboot=debug,tsboot_loader=debug,tsboot_bridge=debug"
    } else {
        "tsboot=warn,tsboot_loader=warn,tsboot_bridge=warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
