use crate::demo::{
    run_access_check, run_demo, run_eligibility, AccessArgs, DemoArgs, EligibilityArgs,
};
use crate::server;
use clap::{Args, Parser, Subcommand};
use revamp::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "REvamp Community Service",
    about = "Run and exercise the REvamp membership and ambassador workflows from the command line",
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
    /// Walk a member from registration through ambassador approval in memory
    Demo(DemoArgs),
    /// Check ambassador eligibility for a set of activity counters
    Eligibility(EligibilityArgs),
    /// Show the access decision for a page path
    Access(AccessArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Demo(args) => run_demo(args),
        Command::Eligibility(args) => run_eligibility(args),
        Command::Access(args) => {
            run_access_check(args);
            Ok(())
        }
    }
}
