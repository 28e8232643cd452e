use std::{future::Future, sync::Arc, time::Duration};

use crate::{
    config::Config,
    models::EventRecord,
    params::DispatchParameters,
    policy::Policy,
};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Options passed along with every job launch.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct LaunchOptions {
    /// How long to wait for the CI server to acknowledge that the build started.
    pub start_timeout: Duration,
}

#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    #[error("build did not start within {0:?}")]
    Timeout(Duration),
    #[error("CI server rejected the credentials (HTTP {0})")]
    Unauthorized(u16),
    #[error("job does not exist on the CI server")]
    UnknownJob,
    #[error("CI server rejected the launch (HTTP {0})")]
    Rejected(u16),
    #[error("queued build was cancelled")]
    Cancelled,
    #[error("unexpected response from CI server: {0}")]
    InvalidResponse(String),
    #[error("transport error: {0}")]
    Transport(#[source] BoxError),
}

/// Starts a build of a single CI job.
pub trait JobLauncher: Send + Sync {
    /// Launch `job_name` with `params`, returning the build number once the build
    /// has started.
    fn launch(
        &self,
        job_name: &str,
        params: &DispatchParameters,
        options: &LaunchOptions,
    ) -> impl Future<Output = Result<u64, LaunchError>> + Send;
}

impl<L: JobLauncher> JobLauncher for Arc<L> {
    fn launch(
        &self,
        job_name: &str,
        params: &DispatchParameters,
        options: &LaunchOptions,
    ) -> impl Future<Output = Result<u64, LaunchError>> + Send {
        (**self).launch(job_name, params, options)
    }
}

/// Result of launching one job.
#[derive(Debug)]
pub struct JobOutcome {
    pub job_name: String,
    pub result: Result<u64, LaunchError>,
}

impl JobOutcome {
    pub fn build_number(&self) -> Option<u64> { self.result.as_ref().ok().copied() }

    pub fn error(&self) -> Option<&LaunchError> { self.result.as_ref().err() }
}

/// Final state of an event's dispatch.
#[derive(Debug)]
pub enum Dispatch {
    /// Suppressed by policy; nothing was launched.
    Vetoed,
    /// The destination project has no jobs configured.
    NoJobs,
    /// Every configured job was attempted.
    Completed(Vec<JobOutcome>),
}

impl Dispatch {
    pub fn outcomes(&self) -> &[JobOutcome] {
        match self {
            Self::Completed(outcomes) => outcomes,
            Self::Vetoed | Self::NoJobs => &[],
        }
    }

    pub fn into_outcomes(self) -> Vec<JobOutcome> {
        match self {
            Self::Completed(outcomes) => outcomes,
            Self::Vetoed | Self::NoJobs => vec![],
        }
    }
}

/// Launches the jobs configured for an event's destination project.
pub struct Dispatcher<L> {
    config: Arc<Config>,
    launcher: L,
}

impl<L: JobLauncher> Dispatcher<L> {
    pub fn new(config: Arc<Config>, launcher: L) -> Self { Self { config, launcher } }

    pub fn policy(&self) -> Policy<'_> { Policy::new(&self.config.policy) }

    pub fn options(&self) -> LaunchOptions {
        LaunchOptions { start_timeout: self.config.jenkins.build_start_timeout() }
    }

    /// Launch every job configured for the event's destination project.
    ///
    /// A failed launch is recorded in its outcome and never stops the remaining jobs
    /// from being attempted.
    pub async fn dispatch(&self, record: &EventRecord) -> Dispatch {
        let allowed = self.policy().is_execution_allowed(record);
        if !allowed {
            log_summary(&summary(record, None));
            return Dispatch::Vetoed;
        }

        let params = DispatchParameters::build(record);
        log_summary(&summary(record, Some(&params)));
        tracing::debug!("Parameters: {:?}", params);

        let project = record.project();
        let jobs = self.config.jobs_for_project(project);
        if jobs.is_empty() {
            tracing::warn!("No jobs found for project: {}", project);
            return Dispatch::NoJobs;
        }

        let options = self.options();
        let mut outcomes = Vec::with_capacity(jobs.len());
        for job_name in jobs {
            tracing::info!("Calling jenkins job: {}", job_name);
            let result = self.launcher.launch(job_name, &params, &options).await;
            match &result {
                Ok(build_number) => {
                    tracing::info!("Jenkins job {} launched. Build number: {}", job_name, build_number);
                }
                Err(e) => {
                    tracing::error!("Bad response from jenkins when launching {}: {}", job_name, e);
                }
            }
            outcomes.push(JobOutcome { job_name: job_name.to_string(), result });
        }
        Dispatch::Completed(outcomes)
    }
}

/// Multi-line description of an event, shown in logs and by the CLI.
///
/// `params` is `None` when the event is suppressed by policy.
pub fn summary(record: &EventRecord, params: Option<&DispatchParameters>) -> String {
    let mut lines = vec![
        format!(" ====== {} ====== ", record.title),
        format!("   - PR status    : {}", record.status.message()),
        format!("   - project      : {}", record.project()),
    ];
    let Some(params) = params else {
        lines.push(" !!! build run is disabled by policy".to_string());
        return lines.join("\n");
    };
    let param = |key| params.get(key).unwrap_or_default();
    lines.push(format!(
        "   - repositories : {} -> {}",
        param(DispatchParameters::SRC_REPO),
        param(DispatchParameters::DEST_REPO)
    ));
    lines.push(format!(
        "   - branches     : {} -> {}",
        param(DispatchParameters::SRC_BRANCH),
        param(DispatchParameters::DEST_BRANCH)
    ));
    lines.push(format!("   - pr_url       : {}", record.html_url));
    lines.push(format!("   - pr_commit    : {}", param(DispatchParameters::PR_LAST_COMMIT)));
    lines.push(format!("   - job_desc     : {}", param(DispatchParameters::JOB_DESCRIPTION)));
    lines.join("\n")
}

fn log_summary(summary: &str) {
    for line in summary.lines() {
        tracing::info!("{}", line);
    }
}
