use std::sync::Arc;

use prhook_core::{
    dispatch::{Dispatch, Dispatcher, JobLauncher},
    models::EventRecord,
};
use tokio::{
    sync::{
        Semaphore,
        mpsc::{self, error::TrySendError},
    },
    task::{JoinError, JoinSet},
};
use tracing::Instrument;

/// Sending half of the queue of events waiting to be dispatched.
#[derive(Clone)]
pub struct EventQueue {
    tx: mpsc::Sender<EventRecord>,
}

impl EventQueue {
    pub fn new(size: usize) -> (Self, mpsc::Receiver<EventRecord>) {
        let (tx, rx) = mpsc::channel(size.max(1));
        (Self { tx }, rx)
    }

    /// Queue an event without waiting. Fails if the queue is full or the workers
    /// have stopped.
    pub fn push(&self, record: EventRecord) -> Result<(), TrySendError<EventRecord>> {
        self.tx.try_send(record)
    }
}

/// Dispatch queued events, running at most `concurrency` at once.
///
/// A worker slot is claimed before an event is taken off the queue, so events
/// beyond `concurrency` stay queued and a full queue rejects new ones.
/// Returns once the queue is closed and every started dispatch has finished.
pub async fn run<L>(
    mut rx: mpsc::Receiver<EventRecord>,
    dispatcher: Arc<Dispatcher<L>>,
    concurrency: usize,
) where
    L: JobLauncher + 'static,
{
    let sem = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut set = JoinSet::new();
    loop {
        let permit = tokio::select! {
            permit = sem.clone().acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
            Some(join_result) = set.join_next(), if !set.is_empty() => {
                log_join(join_result);
                continue;
            }
        };
        let Some(record) = rx.recv().await else { break };
        let dispatcher = dispatcher.clone();
        let span = tracing::info_span!(
            "dispatch",
            project = %record.dest_repo_full_name,
            commit = %record.source_commit_hash,
        );
        set.spawn(
            async move {
                let _permit = permit;
                let dispatch = dispatcher.dispatch(&record).await;
                log_dispatch(&dispatch);
            }
            .instrument(span),
        );
    }
    while let Some(join_result) = set.join_next().await {
        log_join(join_result);
    }
}

fn log_join(join_result: Result<(), JoinError>) {
    if let Err(e) = join_result {
        tracing::error!("Dispatch task failed: {e}");
    }
}

fn log_dispatch(dispatch: &Dispatch) {
    match dispatch {
        Dispatch::Vetoed => tracing::info!("Dispatch skipped by policy"),
        Dispatch::NoJobs => tracing::info!("Dispatch skipped, no jobs configured"),
        Dispatch::Completed(outcomes) => {
            let launched = outcomes.iter().filter(|o| o.result.is_ok()).count();
            tracing::info!("Launched {} of {} jobs", launched, outcomes.len());
            for outcome in outcomes {
                match &outcome.result {
                    Ok(build_number) => tracing::info!("  {}: #{}", outcome.job_name, build_number),
                    Err(e) => tracing::warn!("  {}: failed: {}", outcome.job_name, e),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        sync::{
            Mutex,
            atomic::{AtomicUsize, Ordering},
        },
        time::Duration,
    };

    use prhook_core::{
        config::Config,
        dispatch::{LaunchError, LaunchOptions},
        models::PrStatus,
        params::DispatchParameters,
    };

    use super::*;

    const CONFIG: &str = r#"
server:
  port: 0
jenkins:
  url: http://jenkins.invalid
  user: bot
  pass: secret
projects:
  osrf/sdformat:
    - job: build-linux
    - job: build-osx
"#;

    #[derive(Default)]
    struct SlowLauncher {
        running: AtomicUsize,
        max_running: AtomicUsize,
        launches: Mutex<HashMap<String, usize>>,
    }

    impl JobLauncher for SlowLauncher {
        async fn launch(
            &self,
            job_name: &str,
            params: &DispatchParameters,
            _options: &LaunchOptions,
        ) -> Result<u64, LaunchError> {
            let running = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_running.fetch_max(running, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.running.fetch_sub(1, Ordering::SeqCst);
            let key = format!("{}@{}", job_name, params.get("PR_LAST_COMMIT").unwrap_or_default());
            *self.launches.lock().unwrap().entry(key).or_default() += 1;
            Ok(1)
        }
    }

    fn record(commit: &str) -> EventRecord {
        EventRecord {
            source_repo_full_name: "alice/repo".to_string(),
            dest_repo_full_name: "osrf/sdformat".to_string(),
            source_branch: "fix".to_string(),
            dest_branch: "default".to_string(),
            source_commit_hash: commit.to_string(),
            title: "Fix typo".to_string(),
            description: String::new(),
            html_url: "https://bitbucket.org/osrf/sdformat/pull-requests/42".to_string(),
            status: PrStatus::New,
        }
    }

    #[tokio::test]
    async fn test_run() {
        let config = Arc::new(Config::from_yaml(CONFIG).unwrap());
        let launcher = Arc::new(SlowLauncher::default());
        let dispatcher = Arc::new(Dispatcher::new(config, launcher.clone()));
        let (queue, rx) = EventQueue::new(16);
        for i in 0..6 {
            queue.push(record(&format!("c{i}"))).unwrap();
        }
        drop(queue);
        run(rx, dispatcher, 2).await;

        let launches = launcher.launches.lock().unwrap();
        assert_eq!(launches.len(), 12);
        assert!(launches.values().all(|&n| n == 1));
        let max_running = launcher.max_running.load(Ordering::SeqCst);
        assert!(max_running <= 2, "{max_running}");
    }

    #[test]
    fn test_queue_full() {
        let (queue, _rx) = EventQueue::new(1);
        queue.push(record("a")).unwrap();
        assert!(matches!(queue.push(record("b")), Err(TrySendError::Full(_))));
    }

    #[test]
    fn test_queue_closed() {
        let (queue, rx) = EventQueue::new(1);
        drop(rx);
        assert!(matches!(queue.push(record("a")), Err(TrySendError::Closed(_))));
    }

    struct StuckLauncher;

    impl JobLauncher for StuckLauncher {
        async fn launch(
            &self,
            _job_name: &str,
            _params: &DispatchParameters,
            _options: &LaunchOptions,
        ) -> Result<u64, LaunchError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_backpressure() {
        let config = Arc::new(Config::from_yaml(CONFIG).unwrap());
        let dispatcher = Arc::new(Dispatcher::new(config, StuckLauncher));
        let (queue, rx) = EventQueue::new(1);
        let workers = tokio::spawn(run(rx, dispatcher, 1));

        let mut accepted = 0;
        let mut full = false;
        for i in 0..50 {
            match queue.push(record(&format!("c{i}"))) {
                Ok(()) => accepted += 1,
                Err(TrySendError::Full(_)) => {
                    full = true;
                    break;
                }
                Err(TrySendError::Closed(_)) => panic!("workers stopped"),
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        // One event dispatching, one waiting in the queue
        assert!(full, "accepted {accepted} events without filling the queue");
        assert!(accepted <= 3, "{accepted}");
        workers.abort();
    }
}
