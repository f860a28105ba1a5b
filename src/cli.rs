//! CLI argument parsing
//!
//! Hand-rolled argument handling: one positional commit range, a handful
//! of flags, and config-file defaults merged in for anything not given
//! explicitly.

use std::env;

use crate::config::Config;

pub const USAGE: &str = "\
usage: git stacktrace [<options>] [<RANGE>] < stacktrace from stdin

Lookup commits related to a given stacktrace.

options:
    <RANGE>                   git commit range to use
    --since <date>            show commits more recent than a specific
                              date (from git-log); mutually exclusive
                              with RANGE
    -b, --branch <branch>     git branch; with --since, which branch to
                              run since on (default: current branch)
    -f, --fast                speed things up by not running pickaxe if
                              the file for a line of code cannot be found
    --filter-site-packages    ignore frames from installed third-party
                              packages
    --json                    print results as JSON instead of text
    --version                 print version and exit
    -h, --help                print this help and exit";

/// Parsed command-line arguments.
#[derive(Clone, Debug, Default)]
pub struct Args {
    pub range: Option<String>,
    pub since: Option<String>,
    pub branch: Option<String>,
    pub fast: bool,
    pub json: bool,
    pub filter_site_packages: bool,
    pub show_version: bool,
    pub show_help: bool,
}

/// Parse command-line arguments, exiting on malformed input.
pub fn parse_args() -> Args {
    let argv: Vec<String> = env::args().skip(1).collect();
    match parse_from(&argv) {
        Ok(args) => args,
        Err(message) => {
            eprintln!("Error: {}\n\n{}", message, USAGE);
            std::process::exit(1);
        }
    }
}

fn parse_from(argv: &[String]) -> Result<Args, String> {
    let mut args = Args::default();
    let mut iter = argv.iter();

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-f" | "--fast" => args.fast = true,
            "--json" => args.json = true,
            "--filter-site-packages" => args.filter_site_packages = true,
            "--version" => args.show_version = true,
            "-h" | "--help" => args.show_help = true,
            "--since" => {
                let value = iter.next().ok_or("--since requires a value")?;
                args.since = Some(value.clone());
            }
            "-b" | "--branch" => {
                let value = iter.next().ok_or("--branch requires a value")?;
                args.branch = Some(value.clone());
            }
            _ if arg.starts_with('-') => {
                return Err(format!("unknown option: {}", arg));
            }
            _ => {
                if args.range.is_some() {
                    return Err(format!("unexpected argument: {}", arg));
                }
                args.range = Some(arg.clone());
            }
        }
    }

    if args.range.is_some() && args.since.is_some() {
        return Err("specify either a range or --since, not both".to_string());
    }
    Ok(args)
}

impl Args {
    /// Fill in anything not given explicitly from the config file.
    pub fn apply_config(&mut self, config: &Config) {
        if config.fast {
            self.fast = true;
        }
        if self.branch.is_none() {
            self.branch = config.branch.clone();
        }
    }
}
