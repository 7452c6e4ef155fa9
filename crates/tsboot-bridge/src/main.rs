// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! tsboot-fixtures - check a transpiler against input/expected-output pairs

use anyhow::{bail, Context};
use clap::Parser;
use owo_colors::OwoColorize;
use std::path::PathBuf;
use std::process::ExitCode;
use tsboot_bridge::fixtures::{FixtureSuite, Outcome};
use tsboot_bridge::{CommandTranspiler, LibraryTranspiler, Transform, DEFAULT_SYMBOL};

#[derive(Parser)]
#[command(
    name = "tsboot-fixtures",
    about = "Check transpiler output against fixture pairs",
    version
)]
struct Cli {
    /// Directory holding `*.in.<ext>` / `*.out.<ext>` pairs
    #[arg(default_value = "test_fixtures")]
    root: PathBuf,

    /// Transpiler shared library
    #[arg(long, conflicts_with = "command")]
    library: Option<PathBuf>,

    /// Entry symbol exported by the library
    #[arg(long, default_value = DEFAULT_SYMBOL)]
    symbol: String,

    /// Transpiler program, with arguments separated by spaces
    #[arg(long)]
    command: Option<String>,

    /// Input extension, without the dot
    #[arg(long, default_value = "ts")]
    input_ext: String,

    /// Expected-output extension, without the dot
    #[arg(long, default_value = "js")]
    output_ext: String,

    /// Enable verbose logging
    #[arg(long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "tsboot_bridge=debug"
    } else {
        "tsboot_bridge=warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("{}: {:#}", "Error".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<bool> {
    let transpiler = build_transpiler(cli)?;
    let suite = FixtureSuite::discover(&cli.root, &cli.input_ext, &cli.output_ext)
        .with_context(|| format!("collecting fixtures under {}", cli.root.display()))?;

    if suite.fixtures().is_empty() {
        bail!(
            "no '*.in.{}' fixtures found under {}",
            cli.input_ext,
            suite.root().display()
        );
    }

    let mut failures = 0usize;
    for (fixture, outcome) in suite.run(transpiler.as_ref()) {
        match outcome {
            Outcome::Passed => println!("  {} {}", "✓".green(), fixture.name),
            Outcome::Failed { expected, actual } => {
                failures += 1;
                println!("  {} {}", "✗".red(), fixture.name.bold());
                println!("    {}", "expected:".dimmed());
                for line in expected.lines() {
                    println!("    {}", line.green());
                }
                println!("    {}", "actual:".dimmed());
                for line in actual.lines() {
                    println!("    {}", line.red());
                }
            }
            Outcome::Errored(e) => {
                failures += 1;
                println!("  {} {}: {}", "✗".red(), fixture.name.bold(), e);
            }
        }
    }

    let total = suite.fixtures().len();
    println!();
    if failures == 0 {
        println!("{} {} fixtures passed", "ok".green().bold(), total);
    } else {
        println!(
            "{} {} of {} fixtures failed",
            "FAILED".red().bold(),
            failures,
            total
        );
    }

    Ok(failures == 0)
}

fn build_transpiler(cli: &Cli) -> anyhow::Result<Box<dyn Transform>> {
    if let Some(command) = &cli.command {
        let argv: Vec<String> = command.split_whitespace().map(str::to_string).collect();
        let Some(transpiler) = CommandTranspiler::from_argv(&argv) else {
            bail!("--command is empty");
        };
        return Ok(Box::new(transpiler));
    }

    let library = cli
        .library
        .clone()
        .unwrap_or_else(|| PathBuf::from(LibraryTranspiler::default_file_name()));
    Ok(Box::new(
        LibraryTranspiler::new(library).with_symbol(cli.symbol.clone()),
    ))
}
