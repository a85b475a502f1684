use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::error;

use mzkit_runner::config::ConfigStore;
use mzkit_runner::invoke::ProcessRunner;
use mzkit_runner::pipeline::{RunCoordinator, RunOutcome, preflight};
use mzkit_runner::settings::{RunSettings, ToolPaths};
use mzkit_runner::{Result, logging, report};

use anyhow::Context;

#[derive(Parser)]
#[command(name = "mzkit")]
#[command(about = "Primary entry point for mass spec pipeline", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,

    /// Log level (error, warn, info, debug, trace); RUST_LOG takes precedence.
    #[arg(long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the configured pipeline over a data folder.
    Run {
        #[arg(short = 'd', long)]
        data_folder: PathBuf,

        #[arg(short = 'c', long = "config")]
        config: PathBuf,

        #[arg(short = 'o', long)]
        output_folder: PathBuf,

        /// Overwrite config values, e.g. modules.pipeline_qc.parameters.referenceSample=pool
        #[arg(short = 'w', long = "wild-cards", num_args = 0..)]
        wild_cards: Vec<String>,

        /// Echo module stdout (`-v false` to silence).
        #[arg(short = 'v', long, default_value_t = true, action = ArgAction::Set)]
        verbose: bool,

        #[command(flatten)]
        tools: ToolArgs,
    },
    /// Validate the config and overrides, print the stage summary, run nothing.
    Check {
        #[arg(short = 'c', long = "config")]
        config: PathBuf,

        #[arg(short = 'w', long = "wild-cards", num_args = 0..)]
        wild_cards: Vec<String>,
    },
}

#[derive(Args)]
struct ToolArgs {
    #[arg(long, default_value = "./maven/src/maven/bin")]
    peakdetector_bin_path: PathBuf,

    #[arg(long, default_value = "./maven/src/maven_core/bin/methods/default.model")]
    peakdetector_methods_path: PathBuf,

    #[arg(long, default_value = "./maven/src/maven_core/bin")]
    mzdeltas_bin_path: PathBuf,

    #[arg(long, default_value = "Rscript")]
    rcmd: String,

    #[arg(long, default_value = ".")]
    r_scripts_path: PathBuf,

    #[arg(long, default_value = "./mzkit.R")]
    r_mzkit_path: PathBuf,
}

impl From<ToolArgs> for ToolPaths {
    fn from(args: ToolArgs) -> Self {
        Self {
            peakdetector_bin_path: args.peakdetector_bin_path,
            peakdetector_methods_path: args.peakdetector_methods_path,
            mzdeltas_bin_path: args.mzdeltas_bin_path,
            rcmd: args.rcmd,
            r_scripts_path: args.r_scripts_path,
            r_mzkit_path: args.r_mzkit_path,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(&cli.log_level);

    let result = match cli.cmd {
        Commands::Run {
            data_folder,
            config,
            output_folder,
            wild_cards,
            verbose,
            tools,
        } => run(
            &data_folder,
            &config,
            &output_folder,
            &wild_cards,
            verbose,
            tools.into(),
        ),
        Commands::Check { config, wild_cards } => check(&config, &wild_cards),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            println!("ERROR");
            ExitCode::FAILURE
        }
    }
}

fn run(
    data_folder: &Path,
    config: &Path,
    output_folder: &Path,
    wild_cards: &[String],
    verbose: bool,
    tools: ToolPaths,
) -> Result<ExitCode> {
    // 1) Folders, samples and tools.
    tools.verify()?;
    let settings = RunSettings::prepare(data_folder, output_folder, tools, verbose)?;

    // 2) Config + overrides, persisted to the output folder and reloaded.
    let mut store = ConfigStore::load(config)
        .context("Configuration file missing or unreadable - Exiting program.")?;
    store.apply_overrides(wild_cards)?;
    let document = store.commit(&settings.output_folder.join("config.json"))?;

    report::print_pipeline_summary(&document);

    // 3) Execute.
    let mut runner = ProcessRunner::new(&settings);
    match RunCoordinator::new(&document, &mut runner).run()? {
        RunOutcome::Completed(status) => {
            report::write_success_file(&status, &settings.output_folder, settings.start_time)?;
            Ok(ExitCode::SUCCESS)
        }
        RunOutcome::Halted { .. } => {
            println!("ERROR");
            Ok(ExitCode::FAILURE)
        }
    }
}

fn check(config: &Path, wild_cards: &[String]) -> Result<ExitCode> {
    let mut store = ConfigStore::load(config)
        .context("Configuration file missing or unreadable - Exiting program.")?;
    store.apply_overrides(wild_cards)?;
    let document = store.document();

    report::print_pipeline_summary(document);
    let stages = preflight(document)?;
    println!("{} stages OK", stages.len());
    Ok(ExitCode::SUCCESS)
}
