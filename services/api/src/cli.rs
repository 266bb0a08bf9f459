use crate::commands::{run_export, run_score, run_setup, ExportArgs, ScoreArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use happitrack::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "HappiTrack",
    about = "Score daily mood check-ins and keep a personal happiness history",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Create the history database and seed the admin account
    Setup,
    /// Score one check-in from the command line
    Score(ScoreArgs),
    /// Write a user's history as CSV
    Export(ExportArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// Keep history in process memory instead of the configured database
    #[arg(long)]
    pub(crate) in_memory: bool,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Setup => run_setup().await,
        Command::Score(args) => {
            run_score(args);
            Ok(())
        }
        Command::Export(args) => run_export(args).await,
    }
}
