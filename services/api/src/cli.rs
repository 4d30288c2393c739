use crate::demo::{run_demo, DemoArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use interview_ai::error::AppError;
use interview_ai::workflows::telephonic::import::parse_schedule_csv;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "Telephonic Interview Service",
    about = "Schedule, conduct, and evaluate telephonic interview rounds",
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
    /// Validate a bulk scheduling CSV without scheduling anything
    CheckCsv(CheckCsvArgs),
    /// Run an end-to-end telephonic round against scripted AI services
    Demo(DemoArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// JSON file with jobs, stages, and applications to load at startup
    #[arg(long)]
    pub(crate) seed: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub(crate) struct CheckCsvArgs {
    /// CSV with application_id, scheduled_at, and optional duration_minutes, timezone, notes
    pub(crate) path: PathBuf,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::CheckCsv(args) => check_csv(args).await,
        Command::Demo(args) => run_demo(args).await,
    }
}

async fn check_csv(args: CheckCsvArgs) -> Result<(), AppError> {
    let raw = tokio::fs::read_to_string(&args.path).await?;
    let import = parse_schedule_csv(&raw);
    println!(
        "{}: {} row(s) ready, {} rejected",
        args.path.display(),
        import.requests.len(),
        import.errors.len()
    );
    for request in &import.requests {
        println!(
            "  ok   {} at {}",
            request.application_id,
            request.scheduled_at.to_rfc3339()
        );
    }
    for error in &import.errors {
        println!("  fail {}: {}", error.application_id, error.reason);
    }
    Ok(())
}
