use anyhow::Result;
use argp::FromArgs;
use prhook_core::{
    config::Config, dispatch::summary, models::EventRecord, params::DispatchParameters,
    policy::Policy,
};
use typed_path::Utf8NativePathBuf;

use crate::util::{load_config, native_path, read_event};

#[derive(FromArgs, PartialEq, Eq, Debug)]
/// Show what a saved webhook payload would launch, without contacting Jenkins.
#[argp(subcommand, name = "inspect")]
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

pub fn run(args: Args) -> Result<()> {
    let config = load_config(&args.config)?;
    let record = read_event(&args.payload, &args.key)?;
    print!("{}", describe(&config, &record));
    Ok(())
}

/// Human-readable summary of an event and the dispatch it would cause.
pub fn describe(config: &Config, record: &EventRecord) -> String {
    if !Policy::new(&config.policy).is_execution_allowed(record) {
        return format!("{}\n", summary(record, None));
    }
    let params = DispatchParameters::build(record);
    let mut out = format!("{}\nParameters:\n", summary(record, Some(&params)));
    for (key, value) in &params {
        out.push_str(&format!("   {key}={value}\n"));
    }
    let jobs = config.jobs_for_project(record.project());
    if jobs.is_empty() {
        out.push_str(&format!("No jobs found for project: {}\n", record.project()));
    } else {
        out.push_str("Jobs:\n");
        for job in jobs {
            out.push_str(&format!("   {job}\n"));
        }
    }
    out
}
