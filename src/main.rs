//! git-stacktrace: correlate a stacktrace with recent git commits
//!
//! Reads a traceback from stdin, resolves its frames against the commits
//! in a git range, and prints the candidate commits ranked by how much
//! evidence ties them to the failure.

mod api;
mod cli;
mod config;
mod git;
mod result;
mod traceback;

#[cfg(test)]
mod fixtures_tests;

use std::io::Read;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use serde_json::json;

use crate::cli::Args;
use crate::config::Config;
use crate::git::{GitRepo, Vcs};

fn main() -> ExitCode {
    env_logger::init();

    let mut args = cli::parse_args();
    if args.show_help {
        println!("{}", cli::USAGE);
        return ExitCode::SUCCESS;
    }
    if args.show_version {
        println!("git-stacktrace {}", env!("CARGO_PKG_VERSION"));
        return ExitCode::SUCCESS;
    }

    let config = match Config::load() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{:#}", err);
            return ExitCode::FAILURE;
        }
    };
    args.apply_config(&config);

    match run(&args) {
        Ok(output) => {
            print!("{}", output);
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("{:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<String> {
    let repo = GitRepo::new();
    let range = resolve_range(args, &repo)?;

    let mut input = String::new();
    std::io::stdin()
        .read_to_string(&mut input)
        .context("read stacktrace from stdin")?;

    run_lookup(&repo, &range, &input, args)
}

fn resolve_range(args: &Args, vcs: &dyn Vcs) -> Result<String> {
    if let Some(since) = &args.since {
        let range = vcs.convert_since(since, args.branch.as_deref())?;
        eprintln!("commit range: {}", range);
        return Ok(range);
    }
    match &args.range {
        Some(range) => Ok(range.clone()),
        None => bail!("missing range and since, must use one\n\n{}", cli::USAGE),
    }
}

/// Gate on the range, parse the input, run the lookup, render the report.
fn run_lookup(vcs: &dyn Vcs, range: &str, input: &str, args: &Args) -> Result<String> {
    // Checked before any parsing: an empty range is a user-visible
    // condition, not a pipeline failure.
    if !vcs.valid_range(range)? {
        bail!("Found no commits in '{}'", range);
    }
    if input.trim().is_empty() {
        bail!("No input found in stdin");
    }

    let mut traceback = traceback::parse_trace(input)?;
    if args.filter_site_packages {
        traceback.filter_site_packages();
    }

    let results = api::lookup_stacktrace(vcs, &mut traceback, range, args.fast)?;

    if args.json {
        let mut commits = Vec::new();
        for evidence in results.sorted() {
            commits.push(evidence.to_json(vcs)?);
        }
        let report = serde_json::to_string_pretty(&json!({ "commits": commits }))?;
        return Ok(format!("{}\n", report));
    }

    // Echo the parsed traceback first, the way the input was understood.
    let mut out = traceback.to_string();
    for evidence in results.sorted() {
        out.push('\n');
        out.push_str(&evidence.format(vcs)?);
    }
    if results.is_empty() {
        out.push_str("\nNo matches found\n");
    }
    Ok(out)
}
