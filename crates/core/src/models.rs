use std::fmt;

/// Lifecycle state of a pull request that can trigger a dispatch.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum PrStatus {
    New,
    Updated,
}

impl PrStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Updated => "updated",
        }
    }

    /// Human-readable description used in event summaries.
    pub fn message(&self) -> &'static str {
        match self {
            Self::New => "new pull request",
            Self::Updated => "pull request updated",
        }
    }
}

impl fmt::Display for PrStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// Normalized view of a single pull request webhook event.
///
/// Constructed once per event by the transport layer after the payload has been
/// validated; every field is guaranteed to be present.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct EventRecord {
    pub source_repo_full_name: String,
    pub dest_repo_full_name: String,
    pub source_branch: String,
    pub dest_branch: String,
    pub source_commit_hash: String,
    pub title: String,
    pub description: String,
    pub html_url: String,
    pub status: PrStatus,
}

impl EventRecord {
    /// The project key as it appears in the configuration file (e.g. `osrf/sdformat`).
    pub fn project(&self) -> &str { &self.dest_repo_full_name }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub fn sample_record(status: PrStatus) -> EventRecord {
        EventRecord {
            source_repo_full_name: "alice/repo".to_string(),
            dest_repo_full_name: "osrf/sdformat".to_string(),
            source_branch: "fix".to_string(),
            dest_branch: "default".to_string(),
            source_commit_hash: "abc123".to_string(),
            title: "Fix typo".to_string(),
            description: String::new(),
            html_url: "https://bitbucket.org/osrf/sdformat/pull-requests/42".to_string(),
            status,
        }
    }

    #[test]
    fn test_status_message() {
        assert_eq!(PrStatus::New.message(), "new pull request");
        assert_eq!(PrStatus::Updated.message(), "pull request updated");
        assert_eq!(PrStatus::Updated.to_string(), "updated");
    }

    #[test]
    fn test_project_is_destination() {
        assert_eq!(sample_record(PrStatus::New).project(), "osrf/sdformat");
    }
}
