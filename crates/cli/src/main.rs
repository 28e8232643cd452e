mod cmd;
mod util;

use argp::FromArgs;
use tracing_subscriber::{EnvFilter, filter::LevelFilter};

#[derive(FromArgs, Debug)]
/// Operator tools for the pull request webhook server.
struct TopLevel {
    #[argp(subcommand)]
    command: SubCommand,
    #[argp(switch, short = 'v')]
    /// print debug logging
    verbose: bool,
}

#[derive(FromArgs, Debug)]
#[argp(subcommand)]
enum SubCommand {
    Inspect(cmd::inspect::Args),
    Launch(cmd::launch::Args),
}

#[tokio::main]
async fn main() {
    let args: TopLevel = argp::parse_args_or_exit(argp::DEFAULT);
    let level = if args.verbose { LevelFilter::DEBUG } else { LevelFilter::WARN };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::builder().with_default_directive(level.into()).from_env_lossy())
        .with_writer(std::io::stderr)
        .init();

    let result = match args.command {
        SubCommand::Inspect(args) => cmd::inspect::run(args),
        SubCommand::Launch(args) => cmd::launch::run(args).await,
    };
    if let Err(e) = result {
        eprintln!("Failed: {e:?}");
        std::process::exit(1);
    }
}
