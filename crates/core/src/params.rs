use std::collections::{BTreeMap, btree_map};

use crate::models::EventRecord;

pub const BITBUCKET_URL: &str = "https://bitbucket.org/";

/// Parameters passed to every job launched for an event.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct DispatchParameters(BTreeMap<&'static str, String>);

impl DispatchParameters {
    /// Legacy alias of `SRC_BRANCH`, kept for older job definitions.
    pub const BRANCH: &'static str = "BRANCH";
    pub const SRC_BRANCH: &'static str = "SRC_BRANCH";
    pub const SRC_REPO: &'static str = "SRC_REPO";
    pub const DEST_BRANCH: &'static str = "DEST_BRANCH";
    pub const DEST_REPO: &'static str = "DEST_REPO";
    pub const PR_LAST_COMMIT: &'static str = "PR_LAST_COMMIT";
    pub const JOB_DESCRIPTION: &'static str = "JOB_DESCRIPTION";

    pub fn build(record: &EventRecord) -> Self {
        let mut params = BTreeMap::new();
        params.insert(Self::BRANCH, record.source_branch.clone());
        params.insert(Self::SRC_BRANCH, record.source_branch.clone());
        params.insert(Self::SRC_REPO, repo_url(&record.source_repo_full_name));
        params.insert(Self::DEST_BRANCH, record.dest_branch.clone());
        params.insert(Self::DEST_REPO, repo_url(&record.dest_repo_full_name));
        params.insert(Self::PR_LAST_COMMIT, record.source_commit_hash.clone());
        params.insert(Self::JOB_DESCRIPTION, job_description(record));
        Self(params)
    }

    pub fn get(&self, key: &str) -> Option<&str> { self.0.get(key).map(String::as_str) }

    pub fn iter(&self) -> btree_map::Iter<'_, &'static str, String> { self.0.iter() }

    pub fn len(&self) -> usize { self.0.len() }

    pub fn is_empty(&self) -> bool { self.0.is_empty() }
}

impl<'a> IntoIterator for &'a DispatchParameters {
    type IntoIter = btree_map::Iter<'a, &'static str, String>;
    type Item = (&'a &'static str, &'a String);

    fn into_iter(self) -> Self::IntoIter { self.0.iter() }
}

pub fn repo_url(full_name: &str) -> String { format!("{BITBUCKET_URL}{full_name}") }

/// HTML snippet shown as the build description in Jenkins.
fn job_description(record: &EventRecord) -> String {
    format!(
        "<a href=\"{}\">PR: {}</a><br />branch: {} -> {}<br />repo: {} -> {}",
        record.html_url,
        record.title,
        record.source_branch,
        record.dest_branch,
        record.source_repo_full_name,
        record.dest_repo_full_name,
    )
}
