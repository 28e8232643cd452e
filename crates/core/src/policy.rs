use crate::{
    config::PolicyConfig,
    models::{EventRecord, PrStatus},
};

/// Decides whether an event is allowed to trigger builds.
#[derive(Debug, Clone, Copy)]
pub struct Policy<'a> {
    update_suppressed_projects: &'a [String],
}

impl<'a> Policy<'a> {
    pub fn new(config: &'a PolicyConfig) -> Self {
        Self { update_suppressed_projects: &config.update_suppressed_projects }
    }

    /// Updates to an open pull request against an update-suppressed project are not
    /// built. New pull requests against the same project still are.
    pub fn is_execution_allowed(&self, record: &EventRecord) -> bool {
        let suppressed =
            self.update_suppressed_projects.iter().any(|p| *p == record.dest_repo_full_name);
        !(suppressed && record.status == PrStatus::Updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::tests::sample_record;

    #[test]
    fn test_is_execution_allowed() {
        let config = PolicyConfig::default();
        let policy = Policy::new(&config);
        let cases: &[(&str, PrStatus, bool)] = &[
            ("osrf/gazebo", PrStatus::New, true),
            ("osrf/gazebo", PrStatus::Updated, false),
            ("osrf/sdformat", PrStatus::New, true),
            ("osrf/sdformat", PrStatus::Updated, true),
            ("osrf/gazebo-fork", PrStatus::Updated, true),
            ("", PrStatus::Updated, true),
        ];
        for &(dest, status, expected) in cases {
            let mut record = sample_record(status);
            record.dest_repo_full_name = dest.to_string();
            assert_eq!(policy.is_execution_allowed(&record), expected, "{dest} {status}");
        }
    }

    #[test]
    fn test_configured_projects() {
        let config =
            PolicyConfig { update_suppressed_projects: vec!["osrf/sdformat".to_string()] };
        let policy = Policy::new(&config);
        assert!(!policy.is_execution_allowed(&sample_record(PrStatus::Updated)));
        assert!(policy.is_execution_allowed(&sample_record(PrStatus::New)));

        let config = PolicyConfig { update_suppressed_projects: vec![] };
        let policy = Policy::new(&config);
        assert!(policy.is_execution_allowed(&sample_record(PrStatus::Updated)));
    }
}
