//! Sheetcalc - evaluate spreadsheet cells and formulas from the command line

mod config;
mod error;

use anyhow::Context;
use sheetcalc_core::Document;
use sheetcalc_engine::engine::{CellRef, format_value};
use std::env;
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::error::{CliError, Result};

fn print_usage() {
    eprintln!("Usage: sheetcalc [OPTIONS] [REF=INPUT]...");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  [REF=INPUT]               Cell contents, e.g. A1=5 or B1==SUM(A1:A3)");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -e, --eval <FORMULA>      Evaluate a formula and print it (can be repeated)");
    eprintln!("  -d, --dedupe <RANGE>      Clear duplicate rows inside RANGE (can be repeated)");
    eprintln!("  -c, --config <FILE>       Load settings from a TOML file");
    eprintln!("  --max-depth <N>           Deepest chain of references to follow");
    eprintln!("  -v, --verbose             Log debug output to stderr");
    eprintln!("  -h, --help                Print help");
}

#[derive(Debug, Default, PartialEq)]
struct Options {
    cells: Vec<(CellRef, String)>,
    evals: Vec<String>,
    dedupe: Vec<String>,
    config_file: Option<PathBuf>,
    max_depth: Option<usize>,
    verbose: bool,
}

/// Parse arguments (without the program name). `Ok(None)` means help was asked for.
fn parse_args<I>(args: I) -> Result<Option<Options>>
where
    I: IntoIterator<Item = String>,
{
    let mut options = Options::default();
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        let mut value_for = |option: &str| {
            args.next()
                .ok_or_else(|| CliError::MissingValue(option.to_string()))
        };
        match arg.as_str() {
            "-h" | "--help" => return Ok(None),
            "-e" | "--eval" => options.evals.push(value_for("--eval")?),
            "-d" | "--dedupe" => options.dedupe.push(value_for("--dedupe")?),
            "-c" | "--config" => options.config_file = Some(PathBuf::from(value_for("--config")?)),
            "--max-depth" => {
                let value = value_for("--max-depth")?;
                let depth = value
                    .parse::<usize>()
                    .ok()
                    .filter(|depth| *depth > 0)
                    .ok_or_else(|| CliError::InvalidValue {
                        option: "--max-depth".to_string(),
                        value: value.clone(),
                    })?;
                options.max_depth = Some(depth);
            }
            "-v" | "--verbose" => options.verbose = true,
            arg if arg.starts_with('-') => return Err(CliError::UnknownOption(arg.to_string())),
            _ => {
                let (name, input) = arg
                    .split_once('=')
                    .ok_or_else(|| CliError::InvalidAssignment(arg.clone()))?;
                let cell_ref = CellRef::parse(name.trim())
                    .ok_or_else(|| CliError::InvalidAssignment(arg.clone()))?;
                options.cells.push((cell_ref, input.to_string()));
            }
        }
    }

    Ok(Some(options))
}

fn init_logging(verbose: bool, configured: Option<&str>) {
    let default_filter = if verbose {
        "debug"
    } else {
        configured.unwrap_or("warn")
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(options: Options, config: config::ConfigFile) -> anyhow::Result<()> {
    let mut engine_config = config.engine;
    if let Some(depth) = options.max_depth {
        engine_config.max_depth = depth;
    }

    let mut doc = Document::with_config(engine_config);
    let recalc = doc.load_cells(options.cells).context("failed to load cells")?;
    debug!(formulas = recalc.recomputed.len(), "cells loaded");

    for range in &options.dedupe {
        let report = doc
            .remove_duplicate_rows(range)
            .with_context(|| format!("failed to remove duplicates in {range}"))?;
        eprintln!(
            "{}: {} rows analyzed, {} duplicate rows removed",
            range,
            report.analyzed_rows,
            report.duplicate_rows.len()
        );
    }

    if !options.evals.is_empty() {
        for formula in &options.evals {
            let formula = formula.trim();
            let value = if formula.starts_with('=') {
                doc.evaluate(formula)
            } else {
                doc.evaluate(&format!("={formula}"))
            };
            println!("{}", format_value(&value));
        }
        return Ok(());
    }

    for cell_ref in doc.cell_refs() {
        let display = doc.get_cell_display(&cell_ref);
        if !display.is_empty() {
            println!("{}\t{}", cell_ref, display);
        }
    }
    Ok(())
}

fn main() {
    let options = match parse_args(env::args().skip(1)) {
        Ok(Some(options)) => options,
        Ok(None) => {
            print_usage();
            return;
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            print_usage();
            std::process::exit(2);
        }
    };

    let (config, warnings) = config::load_config(options.config_file.as_ref());
    init_logging(options.verbose, config.log.as_deref());
    for warning in warnings {
        eprintln!("Warning: {}", warning);
    }

    if let Err(e) = run(options, config) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_cells_and_options() {
        let options = parse_args(args(&[
            "A1=5",
            "b2==SUM(A1:A3)",
            "-e",
            "A1 * 2",
            "--dedupe",
            "A1:B3",
            "--max-depth",
            "16",
            "-v",
        ]))
        .unwrap()
        .unwrap();

        assert_eq!(
            options.cells,
            vec![
                (CellRef::new(1, 1), "5".to_string()),
                (CellRef::new(2, 2), "=SUM(A1:A3)".to_string()),
            ]
        );
        assert_eq!(options.evals, ["A1 * 2"]);
        assert_eq!(options.dedupe, ["A1:B3"]);
        assert_eq!(options.max_depth, Some(16));
        assert!(options.verbose);
    }

    #[test]
    fn test_parse_help() {
        assert_eq!(parse_args(args(&["A1=1", "--help"])).unwrap(), None);
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            parse_args(args(&["--eval"])),
            Err(CliError::MissingValue("--eval".into()))
        );
        assert_eq!(
            parse_args(args(&["--frobnicate"])),
            Err(CliError::UnknownOption("--frobnicate".into()))
        );
        assert_eq!(
            parse_args(args(&["A0=1"])),
            Err(CliError::InvalidAssignment("A0=1".into()))
        );
        assert_eq!(
            parse_args(args(&["hello"])),
            Err(CliError::InvalidAssignment("hello".into()))
        );
        assert!(matches!(
            parse_args(args(&["--max-depth", "0"])),
            Err(CliError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_empty_cell_input_is_allowed() {
        let options = parse_args(args(&["C3="])).unwrap().unwrap();
        assert_eq!(options.cells, vec![(CellRef::new(3, 3), String::new())]);
    }
}
