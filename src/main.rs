use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use nvsniff::cli::{Cli, Command, OutputFormat, ParseArgs};
use nvsniff::config::{EnforceMode, SnifferConfig};
use nvsniff::json_output::{JsonReport, JsonStats};
use nvsniff::pipeline::{Outcome, Pipeline};
use nvsniff::results::Results;
use nvsniff::seeds;
use nvsniff::support::SupportedSet;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber; `--debug` raises everything to TRACE
fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::from_default_env().add_directive(tracing::Level::TRACE.into())
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Open one input stream; "-" is stdin
fn open_input(path: &Path) -> Result<Box<dyn Read>> {
    if path == Path::new("-") {
        return Ok(Box::new(io::stdin().lock()));
    }
    let file =
        File::open(path).with_context(|| format!("Failed to open input {}", path.display()))?;
    Ok(Box::new(BufReader::new(file)))
}

fn build_config(args: &ParseArgs, enforce: EnforceMode) -> Result<SnifferConfig> {
    let supported = match &args.supported {
        Some(path) => SupportedSet::from_file(path)?,
        None => SupportedSet::empty(),
    };
    info!("Loaded {} supported (category, subcategory) pairs", supported.len());

    let mut config = SnifferConfig::new()
        .with_supported(supported)
        .with_enforce_mode(enforce);
    if let Some(path) = args.dump_path() {
        config = config.with_dump_path(path);
    }
    Ok(config)
}

fn print_report(results: &Results, stats: JsonStats, args: &ParseArgs) -> Result<()> {
    match args.format {
        OutputFormat::Text => {
            print!("{}", results.render());
            if args.stats {
                eprintln!(
                    "{} records, {} classified, {} skipped, {} dumped",
                    stats.records, stats.classified, stats.skipped, stats.dumped
                );
            }
        }
        OutputFormat::Json => {
            let mut report = JsonReport::from_results(results);
            if args.stats {
                report = report.with_stats(stats);
            }
            println!("{}", report.to_json()?);
        }
    }
    Ok(())
}

fn run_parse(args: ParseArgs) -> Result<ExitCode> {
    let enforce = args.enforce_mode();
    let pipeline = Pipeline::new(build_config(&args, enforce)?)?;
    let inputs = if args.inputs.is_empty() {
        vec![PathBuf::from("-")]
    } else {
        args.inputs.clone()
    };

    let mut total = Results::new();
    let mut stats = JsonStats::default();
    for input in &inputs {
        let (outcome, run) = pipeline.process_with_stats(open_input(input)?);
        stats.accumulate(&run);
        match outcome {
            Outcome::Completed(results) => total.merge(&results),
            Outcome::Aborted { trigger, .. } => {
                warn!(
                    "Unsupported ioctl in {}: {} {:#x}; exiting",
                    input.display(),
                    trigger.category,
                    trigger.subcategory
                );
                return Ok(ExitCode::FAILURE);
            }
        }
    }

    print_report(&total, stats, &args)?;

    if enforce.fails_on_unsupported() && total.has_unsupported() {
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

fn main() -> Result<ExitCode> {
    let args = Cli::parse();

    init_tracing(args.debug);

    match args.command {
        Command::Parse(parse_args) => run_parse(parse_args),
        Command::ExtractSeeds { dump, out_dir } => {
            let summary = seeds::extract_seeds(&dump, &out_dir)?;
            println!("{} to {}", summary, out_dir.display());
            Ok(ExitCode::SUCCESS)
        }
        Command::InspectSeed { seed } => {
            print!("{}", seeds::inspect_seed(&seed)?);
            Ok(ExitCode::SUCCESS)
        }
    }
}
