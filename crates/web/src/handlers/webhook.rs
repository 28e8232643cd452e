use anyhow::anyhow;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use prhook_bitbucket::{BitbucketEvent, parse_pull_request};
use prhook_core::AppError;
use tokio::sync::mpsc::error::TrySendError;

use crate::AppState;

/// Webhook handler that queues pull request events for dispatch.
pub async fn webhook(
    State(state): State<AppState>,
    BitbucketEvent { key, body }: BitbucketEvent,
) -> Result<Response, AppError> {
    if key.is_close() {
        tracing::info!("Pull request closed ({})", key);
        return Ok((StatusCode::OK, "Pull request closed").into_response());
    }
    let Some(status) = key.status() else {
        tracing::warn!("Received an unknown action type from bitbucket: {}", key);
        return Ok((StatusCode::OK, "Event ignored").into_response());
    };

    let record = match parse_pull_request(status, &body) {
        Ok(record) => record,
        Err(e) => {
            tracing::error!("Rejected {} event: {}", key, e);
            return Ok((StatusCode::BAD_REQUEST, e.to_string()).into_response());
        }
    };

    let project = record.dest_repo_full_name.clone();
    match state.queue.push(record) {
        Ok(()) => {}
        Err(TrySendError::Full(_)) => {
            tracing::warn!("Dispatch queue full, dropping {} event for {}", key, project);
            return Err(AppError::Status(StatusCode::SERVICE_UNAVAILABLE));
        }
        Err(TrySendError::Closed(_)) => return Err(anyhow!("Dispatch workers stopped").into()),
    }
    tracing::info!("Queued {} event for {}", key, project);
    Ok((StatusCode::OK, "Event queued").into_response())
}

#[cfg(test)]
mod tests {
    use axum::{
        Router,
        body::{Body, to_bytes},
        http::Request,
    };
    use prhook_core::models::{EventRecord, PrStatus};
    use tokio::sync::mpsc;
    use tower::ServiceExt;

    use super::*;
    use crate::{handlers::build_router, worker::EventQueue};

    const FIXTURE: &str = include_str!("../../../bitbucket/fixtures/pullrequest_created.json");

    fn app(queue_size: usize) -> (Router, mpsc::Receiver<EventRecord>) {
        let (queue, rx) = EventQueue::new(queue_size);
        (build_router().with_state(AppState { queue }), rx)
    }

    async fn post(
        router: &Router,
        uri: &str,
        key: Option<&str>,
        body: &str,
    ) -> (StatusCode, String) {
        let mut builder = Request::builder().method("POST").uri(uri);
        if let Some(key) = key {
            builder = builder.header("X-Event-Key", key);
        }
        let request = builder.body(Body::from(body.to_string())).unwrap();
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_created() {
        let (router, mut rx) = app(4);
        let (status, body) = post(&router, "/", Some("pullrequest:created"), FIXTURE).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "Event queued");
        let record = rx.try_recv().unwrap();
        assert_eq!(record.status, PrStatus::New);
        assert_eq!(record.dest_repo_full_name, "osrf/sdformat");
        assert_eq!(record.source_commit_hash, "abc123");
    }

    #[tokio::test]
    async fn test_updated() {
        let (router, mut rx) = app(4);
        let (status, _) =
            post(&router, "/api/bitbucket/webhook", Some("pullrequest:updated"), FIXTURE).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(rx.try_recv().unwrap().status, PrStatus::Updated);
    }

    #[tokio::test]
    async fn test_close() {
        let (router, mut rx) = app(4);
        for key in ["pullrequest:fulfilled", "pullrequest:rejected"] {
            // Close events are acknowledged without parsing the payload
            let (status, body) = post(&router, "/", Some(key), "{}").await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body, "Pull request closed");
        }
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unknown() {
        let (router, mut rx) = app(4);
        let (status, body) = post(&router, "/", Some("repo:push"), FIXTURE).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "Event ignored");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_malformed() {
        let (router, mut rx) = app(4);
        let payload = FIXTURE.replace(r#""branch": { "name": "fix" }"#, r#""branch": {}"#);
        assert_ne!(payload, FIXTURE);
        let (status, body) = post(&router, "/", Some("pullrequest:created"), &payload).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("malformed pull request payload"), "{body}");
        assert!(rx.try_recv().is_err());

        let (status, _) = post(&router, "/", None, FIXTURE).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_queue_full() {
        let (router, _rx) = app(1);
        let (status, _) = post(&router, "/", Some("pullrequest:created"), FIXTURE).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = post(&router, "/", Some("pullrequest:created"), FIXTURE).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_workers_stopped() {
        let (router, rx) = app(1);
        drop(rx);
        let (status, _) = post(&router, "/", Some("pullrequest:created"), FIXTURE).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
