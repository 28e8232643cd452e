use prhook_core::models::{EventRecord, PrStatus};
use serde::{Deserialize, Deserializer};

/// The webhook body did not contain a complete pull request.
#[derive(Debug, thiserror::Error)]
#[error("malformed pull request payload: {0}")]
pub struct ConstructionError(#[from] serde_json::Error);

#[derive(Deserialize)]
struct WebhookBody {
    pullrequest: PullRequest,
}

#[derive(Deserialize)]
struct PullRequest {
    title: String,
    #[serde(deserialize_with = "null_as_empty")]
    description: String,
    source: Source,
    destination: Destination,
    links: Links,
}

#[derive(Deserialize)]
struct Source {
    repository: Repository,
    branch: Branch,
    commit: Commit,
}

#[derive(Deserialize)]
struct Destination {
    repository: Repository,
    branch: Branch,
}

#[derive(Deserialize)]
struct Repository {
    full_name: String,
}

#[derive(Deserialize)]
struct Branch {
    name: String,
}

#[derive(Deserialize)]
struct Commit {
    hash: String,
}

#[derive(Deserialize)]
struct Links {
    html: Link,
}

#[derive(Deserialize)]
struct Link {
    href: String,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where D: Deserializer<'de> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Parse a `pullrequest:created` or `pullrequest:updated` webhook body.
///
/// Fails if any field needed to dispatch builds is missing or has the wrong type.
pub fn parse_pull_request(status: PrStatus, body: &[u8]) -> Result<EventRecord, ConstructionError> {
    let WebhookBody { pullrequest: pr } = serde_json::from_slice(body)?;
    Ok(EventRecord {
        source_repo_full_name: pr.source.repository.full_name,
        dest_repo_full_name: pr.destination.repository.full_name,
        source_branch: pr.source.branch.name,
        dest_branch: pr.destination.branch.name,
        source_commit_hash: pr.source.commit.hash,
        title: pr.title,
        description: pr.description,
        html_url: pr.links.html.href,
        status,
    })
}
