use std::path::PathBuf;
use std::str::FromStr;

use clap::{ArgAction, Args, Command, FromArgMatches as _};

use crate::config::ScenarioConfig;
use crate::error::EpiError;
use crate::log::{set_log_level, LevelFilter};
use crate::reference::ReferenceData;
use crate::report::{write_ledger_csv, ReportOptions};
use crate::world::{World, WorldBuilder};

/// Command line arguments of the `epiworld` binary
#[derive(Args, Debug)]
pub struct BaseArgs {
    /// Path to the scenario JSON file
    #[arg(short, long)]
    pub config: PathBuf,

    /// Directory holding the cleaned reference data files
    #[arg(long, default_value = "data")]
    pub data_dir: PathBuf,

    /// Directory the ledger CSV is written to
    #[arg(short, long, default_value = ".")]
    pub output_dir: PathBuf,

    /// Prefix for output file names
    #[arg(long, default_value = "")]
    pub file_prefix: String,

    /// Replace existing output files
    #[arg(long)]
    pub force_overwrite: bool,

    /// Number of days to simulate, overriding the scenario
    #[arg(long)]
    pub days: Option<u32>,

    /// Worker threads, overriding the scenario
    #[arg(long)]
    pub threads: Option<usize>,

    /// Log level: off, error, warn, info, debug or trace
    #[arg(long)]
    pub log_level: Option<String>,

    /// Increase logging verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

fn create_epiworld_cli() -> Command {
    let cli = Command::new("epiworld").about("Simulates an epidemic across countries and cities");
    BaseArgs::augment_args(cli)
}

/// Parses the process arguments and runs the scenario they name.
///
/// # Errors
/// Returns an error if the scenario or reference data cannot be loaded, the world cannot be
/// built or seeded, or the ledger cannot be written.
pub fn run_with_args() -> Result<World, Box<dyn std::error::Error>> {
    let matches = create_epiworld_cli().get_matches();
    let args = BaseArgs::from_arg_matches(&matches)?;
    Ok(run_with_args_internal(&args)?)
}

fn configure_logging(args: &BaseArgs) -> Result<(), EpiError> {
    let level = match &args.log_level {
        Some(level) => LevelFilter::from_str(level)
            .map_err(|_| EpiError::InvalidConfig(format!("unknown log level {level:?}")))?,
        None => match args.verbose {
            0 => return Ok(()),
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        },
    };
    set_log_level(level);
    Ok(())
}

fn run_with_args_internal(args: &BaseArgs) -> Result<World, EpiError> {
    configure_logging(args)?;

    let mut scenario = ScenarioConfig::load(&args.config)?;
    if let Some(days) = args.days {
        scenario.days = days;
    }
    if args.threads.is_some() {
        scenario.threads = args.threads;
    }
    scenario.validate()?;

    let reference = ReferenceData::load(&args.data_dir)?;
    let mut world = WorldBuilder::new(scenario.simulation)
        .threads(scenario.threads)
        .mortality(scenario.mortality)
        .build(&reference)?;
    world.apply_seeds(&scenario.seeds)?;

    let days = world.run(scenario.days);

    let mut report_options = ReportOptions::default();
    report_options
        .directory(args.output_dir.clone())
        .file_prefix(args.file_prefix.clone())
        .overwrite(args.force_overwrite);
    write_ledger_csv(world.ledger(), &report_options)?;

    println!("Simulated {days} days");
    Ok(world)
}
