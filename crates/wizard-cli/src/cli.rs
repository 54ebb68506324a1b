use std::path::PathBuf;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::cmd::{
    self, Workspace,
    schema::SchemaArgs,
    wizard::{KindArgs, SessionArgs, StartArgs, StepArgs, StepsArgs},
};
use crate::config::StepwiseConfig;

pub const LOG_ENV: &str = "STEPWISE_LOG";

#[derive(Parser, Debug)]
#[command(
    name = "stepwise",
    about = "Run configuration-driven step wizards",
    version,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Config file; defaults to ./stepwise.toml when present
    #[arg(long, value_name = "PATH", env = "STEPWISE_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Overrides `state_dir` from the config
    #[arg(long = "state-dir", value_name = "DIR", env = "STEPWISE_STATE_DIR", global = true)]
    state_dir: Option<PathBuf>,

    /// Raise log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start (or restart) a wizard session on its first step
    Start(StartArgs),
    /// Submit answers for the current step
    Step(StepArgs),
    /// Show the persisted state and the current step
    Inspect(SessionArgs),
    /// List the steps of a wizard definition
    Steps(StepsArgs),
    /// List sessions with persisted state
    Sessions(KindArgs),
    /// Remove the persisted state of a session
    Reset(SessionArgs),
    /// Print the JSON schema of wizard definitions
    Schema(SchemaArgs),
}

pub fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Commands::Schema(args) = &cli.command {
        return cmd::schema::run(args);
    }

    let config = StepwiseConfig::discover(cli.config.as_deref())?;
    let ws = Workspace::new(config, cli.state_dir);
    match &cli.command {
        Commands::Start(args) => cmd::wizard::start(&ws, args),
        Commands::Step(args) => cmd::wizard::step(&ws, args),
        Commands::Inspect(args) => cmd::wizard::inspect(&ws, args),
        Commands::Steps(args) => cmd::wizard::steps(&ws, args),
        Commands::Sessions(args) => cmd::wizard::sessions(&ws, args),
        Commands::Reset(args) => cmd::wizard::reset(&ws, args),
        Commands::Schema(args) => cmd::schema::run(args),
    }
}

/// Logs go to stderr so stdout stays machine-readable.
fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        _ => EnvFilter::new("debug"),
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
