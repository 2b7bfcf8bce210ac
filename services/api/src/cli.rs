use crate::demo::{run_demo, run_queue_report, DemoArgs, QueueReportArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use dealer_ops::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Get Ready Approvals",
    about = "Serve and inspect the get-ready approval queue from the command line",
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
    /// Print the ordered approval queue for a JSON export of pending vehicles
    Queue(QueueReportArgs),
    /// Run an end-to-end approval session against seeded in-memory data
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
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Queue(args) => run_queue_report(args),
        Command::Demo(args) => run_demo(args).await,
    }
}
