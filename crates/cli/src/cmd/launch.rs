use std::sync::Arc;

use anyhow::{Context, Result, bail};
use argp::FromArgs;
use prhook_core::dispatch::{Dispatch, Dispatcher};
use prhook_jenkins::Jenkins;
use typed_path::Utf8NativePathBuf;

use crate::util::{load_config, native_path, read_event};

#[derive(FromArgs, PartialEq, Eq, Debug)]
/// Launch the jobs for a saved webhook payload.
#[argp(subcommand, name = "launch")]
pub struct Args {
    #[argp(option, short = 'c', from_str_fn(native_path))]
    /// configuration file
    config: Utf8NativePathBuf,
    #[argp(option, short = 'p', from_str_fn(native_path))]
    /// webhook payload (JSON)
    payload: Utf8NativePathBuf,
    #[argp(option, short = 'k', default = "String::from(\"pullrequest:created\")")]
    /// event key the payload was delivered with
    key: String,
}

pub async fn run(args: Args) -> Result<()> {
    let config = Arc::new(load_config(&args.config)?);
    let record = read_event(&args.payload, &args.key)?;
    let jenkins = Jenkins::new(&config.jenkins).context("Failed to create Jenkins client")?;
    let dispatcher = Dispatcher::new(config, jenkins);
    let outcomes = match dispatcher.dispatch(&record).await {
        Dispatch::Vetoed => {
            println!("Build run for {} is disabled by policy", record.project());
            return Ok(());
        }
        Dispatch::NoJobs => {
            println!("No jobs found for project: {}", record.project());
            return Ok(());
        }
        Dispatch::Completed(outcomes) => outcomes,
    };
    let mut failed = 0;
    for outcome in &outcomes {
        match &outcome.result {
            Ok(build_number) => println!("{}: build #{}", outcome.job_name, build_number),
            Err(e) => {
                failed += 1;
                println!("{}: failed: {}", outcome.job_name, e);
            }
        }
    }
    if failed > 0 {
        bail!("{} of {} jobs failed to launch", failed, outcomes.len());
    }
    Ok(())
}
