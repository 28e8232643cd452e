use std::{collections::HashMap, fmt, fs, path::Path, time::Duration};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(alias = "jenkins_server")]
    pub jenkins: JenkinsConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub policy: PolicyConfig,
    /// Destination project full name (e.g. `osrf/sdformat`) to the jobs it triggers.
    #[serde(default)]
    pub projects: HashMap<String, Vec<JobEntry>>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Clone, Deserialize, Serialize)]
pub struct JenkinsConfig {
    pub url: String,
    pub user: String,
    pub pass: String,
    /// Seconds to wait for a queued build to be assigned a build number.
    #[serde(default = "default_build_start_timeout")]
    pub build_start_timeout: u64,
    /// Seconds before a single HTTP request to Jenkins is abandoned.
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_build_start_timeout() -> u64 { 30 }

fn default_request_timeout() -> u64 { 10 }

fn default_poll_interval_ms() -> u64 { 1000 }

impl JenkinsConfig {
    pub fn build_start_timeout(&self) -> Duration { Duration::from_secs(self.build_start_timeout) }

    pub fn request_timeout(&self) -> Duration { Duration::from_secs(self.request_timeout) }

    pub fn poll_interval(&self) -> Duration { Duration::from_millis(self.poll_interval_ms) }
}

impl fmt::Debug for JenkinsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JenkinsConfig")
            .field("url", &self.url)
            .field("user", &self.user)
            .field("pass", &"[redacted]")
            .field("build_start_timeout", &self.build_start_timeout)
            .field("request_timeout", &self.request_timeout)
            .field("poll_interval_ms", &self.poll_interval_ms)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Maximum number of events dispatched at the same time.
    pub concurrency: usize,
    /// Number of accepted events that may wait for a free worker.
    pub queue_size: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self { Self { concurrency: 4, queue_size: 64 } }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Projects whose pull request updates do not trigger builds.
    pub update_suppressed_projects: Vec<String>,
}

impl Default for PolicyConfig {
    fn default() -> Self { Self { update_suppressed_projects: vec!["osrf/gazebo".to_string()] } }
}

/// A job entry under a project, either `- job: name` or a bare `- name`.
#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum JobEntry {
    Named { job: String },
    Bare(String),
}

impl JobEntry {
    pub fn name(&self) -> &str {
        match self {
            Self::Named { job } => job,
            Self::Bare(job) => job,
        }
    }
}

impl Config {
    /// Load the configuration from a YAML file.
    ///
    /// The file may either hold the configuration directly or nest it under a
    /// top-level `config` key.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_yaml(&data)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    pub fn from_yaml(data: &str) -> Result<Self> {
        let mut value: serde_yaml::Value = serde_yaml::from_str(data)?;
        if let Some(inner) = value.get("config").cloned() {
            value = inner;
        }
        Ok(serde_yaml::from_value(value)?)
    }

    /// Jobs configured for a destination project, in declared order.
    /// Unknown projects have no jobs.
    pub fn jobs_for_project(&self, project: &str) -> Vec<&str> {
        self.projects
            .get(project)
            .map(|jobs| jobs.iter().map(JobEntry::name).collect())
            .unwrap_or_default()
    }
}
