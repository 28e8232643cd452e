use std::fmt::{self, Display};

use axum::{
    body::Bytes,
    extract::{FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use prhook_core::models::PrStatus;

/// Value of the `X-Event-Key` header sent with every Bitbucket webhook.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum EventKey {
    Created,
    Updated,
    Fulfilled,
    Rejected,
    Other(String),
}

impl EventKey {
    pub fn parse(key: &str) -> Self {
        match key {
            "pullrequest:created" => Self::Created,
            "pullrequest:updated" => Self::Updated,
            "pullrequest:fulfilled" => Self::Fulfilled,
            "pullrequest:rejected" => Self::Rejected,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Created => "pullrequest:created",
            Self::Updated => "pullrequest:updated",
            Self::Fulfilled => "pullrequest:fulfilled",
            Self::Rejected => "pullrequest:rejected",
            Self::Other(key) => key,
        }
    }

    /// The pull request status for events that may trigger builds.
    pub fn status(&self) -> Option<PrStatus> {
        match self {
            Self::Created => Some(PrStatus::New),
            Self::Updated => Some(PrStatus::Updated),
            _ => None,
        }
    }

    /// Whether the event closes the pull request (merged or declined).
    pub fn is_close(&self) -> bool { matches!(self, Self::Fulfilled | Self::Rejected) }
}

impl Display for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// Extract the Bitbucket event key and raw payload from a webhook request.
#[derive(Clone)]
#[must_use]
pub struct BitbucketEvent {
    pub key: EventKey,
    pub body: Bytes,
}

impl<S> FromRequest<S> for BitbucketEvent
where S: Send + Sync
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        fn err(m: impl Display) -> Response {
            tracing::error!("{m}");
            (StatusCode::BAD_REQUEST, m.to_string()).into_response()
        }
        let key = req
            .headers()
            .get("X-Event-Key")
            .and_then(|v| v.to_str().ok())
            .map(EventKey::parse)
            .ok_or_else(|| err("X-Event-Key header missing"))?;
        let body = Bytes::from_request(req, state).await.map_err(|_| err("error reading body"))?;
        Ok(BitbucketEvent { key, body })
    }
}
