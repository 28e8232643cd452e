use std::time::Duration;

use anyhow::{Context, Result, bail};
use prhook_core::{
    config::JenkinsConfig,
    dispatch::{JobLauncher, LaunchError, LaunchOptions},
    params::DispatchParameters,
};
use reqwest::{StatusCode, header};
use serde::Deserialize;
use tokio::time::{sleep, timeout};
use url::Url;

/// Client for the Jenkins remote access API.
#[derive(Clone)]
pub struct Jenkins {
    client: reqwest::Client,
    base_url: Url,
    user: String,
    pass: String,
    poll_interval: Duration,
}

#[derive(Debug, Deserialize)]
struct QueueItem {
    #[serde(default)]
    cancelled: bool,
    executable: Option<Executable>,
    why: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Executable {
    number: u64,
}

impl Jenkins {
    pub fn new(config: &JenkinsConfig) -> Result<Self> {
        let base_url = Url::parse(&config.url)
            .with_context(|| format!("Invalid Jenkins URL {}", config.url))?;
        if base_url.cannot_be_a_base() {
            bail!("Invalid Jenkins URL {}", config.url);
        }
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .user_agent(concat!("prhook/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            client,
            base_url,
            user: config.user.clone(),
            pass: config.pass.clone(),
            poll_interval: config.poll_interval(),
        })
    }

    /// URL of a job endpoint. Slashes in the job name separate folders.
    fn job_url(&self, job_name: &str, endpoint: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty();
            for part in job_name.split('/').filter(|p| !p.is_empty()) {
                segments.push("job").push(part);
            }
            segments.push(endpoint);
        }
        url
    }

    /// Queue a build and return the URL of its queue item.
    async fn enqueue(&self, job_name: &str, params: &DispatchParameters) -> Result<Url, LaunchError> {
        let form = params.iter().map(|(k, v)| (*k, v.as_str())).collect::<Vec<_>>();
        let response = self
            .client
            .post(self.job_url(job_name, "buildWithParameters"))
            .basic_auth(&self.user, Some(&self.pass))
            .form(&form)
            .send()
            .await
            .map_err(transport)?;
        let status = response.status();
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(LaunchError::Unauthorized(status.as_u16()));
            }
            StatusCode::NOT_FOUND => return Err(LaunchError::UnknownJob),
            status if !status.is_success() => return Err(LaunchError::Rejected(status.as_u16())),
            _ => {}
        }
        let location = response
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| LaunchError::InvalidResponse("missing queue item location".into()))?;
        let mut queue_url = self
            .base_url
            .join(location)
            .map_err(|e| LaunchError::InvalidResponse(format!("invalid queue location: {e}")))?;
        if !queue_url.path().ends_with('/') {
            let path = format!("{}/", queue_url.path());
            queue_url.set_path(&path);
        }
        queue_url.join("api/json").map_err(|e| LaunchError::InvalidResponse(e.to_string()))
    }

    /// Poll a queue item until Jenkins assigns it a build number.
    async fn wait_for_build(&self, queue_url: &Url) -> Result<u64, LaunchError> {
        loop {
            let response = self
                .client
                .get(queue_url.clone())
                .basic_auth(&self.user, Some(&self.pass))
                .send()
                .await
                .map_err(transport)?;
            let status = response.status();
            if !status.is_success() {
                return Err(LaunchError::Rejected(status.as_u16()));
            }
            let item: QueueItem = response.json().await.map_err(transport)?;
            if let Some(executable) = item.executable {
                return Ok(executable.number);
            }
            if item.cancelled {
                return Err(LaunchError::Cancelled);
            }
            tracing::debug!(
                "Waiting for {}: {}",
                queue_url,
                item.why.as_deref().unwrap_or("[no reason given]")
            );
            sleep(self.poll_interval).await;
        }
    }
}

fn transport(e: reqwest::Error) -> LaunchError { LaunchError::Transport(Box::new(e)) }

impl JobLauncher for Jenkins {
    async fn launch(
        &self,
        job_name: &str,
        params: &DispatchParameters,
        options: &LaunchOptions,
    ) -> Result<u64, LaunchError> {
        let start_timeout = options.start_timeout;
        timeout(start_timeout, async {
            let queue_url = self.enqueue(job_name, params).await?;
            tracing::debug!("Queued jenkins job {} at {}", job_name, queue_url);
            self.wait_for_build(&queue_url).await
        })
        .await
        .unwrap_or(Err(LaunchError::Timeout(start_timeout)))
    }
}
