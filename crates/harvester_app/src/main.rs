mod platform;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use engine_logging::engine_error;
use log::LevelFilter;

use platform::app::RunOptions;
use platform::logging::LogDestination;

#[derive(Parser, Debug)]
#[command(name = "harvester")]
#[command(about = "Collect timelines and profiles for a list of subjects")]
#[command(version)]
struct Cli {
    /// Subject list, one id per line
    #[arg(long, default_value = "usernames.txt")]
    subjects: PathBuf,

    /// Append-only list of subjects found unavailable
    #[arg(long, default_value = "problematic_usernames.txt")]
    registry: PathBuf,

    /// Directory receiving one folder per subject
    #[arg(long, default_value = ".")]
    output: PathBuf,

    /// RON file overriding the built-in settings
    #[arg(long)]
    config: Option<PathBuf>,

    /// JSON script driving the scripted automation backend
    #[arg(long)]
    replay: PathBuf,

    #[arg(long, value_enum, default_value_t = LogDestination::Terminal)]
    log: LogDestination,

    #[arg(long, default_value = "harvester.log")]
    log_file: PathBuf,

    /// Also log attempt phases and skipped responses
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    platform::logging::initialize(cli.log, &cli.log_file, level);

    let options = RunOptions {
        subjects: cli.subjects,
        registry: cli.registry,
        output: cli.output,
        config: cli.config,
        replay: cli.replay,
    };
    match platform::app::run(&options) {
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            engine_error!("{err:#}");
            eprintln!("Error: {err:#}");
            ExitCode::from(1)
        }
    }
}
