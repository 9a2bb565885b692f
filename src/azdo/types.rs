use serde::de::IgnoredAny;
use serde::Deserialize;

/// Azure DevOps list envelope: `{"count": n, "value": [...]}`.
#[derive(Debug, Deserialize)]
pub struct ValueList<T> {
    pub value: Vec<T>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
}

impl Project {
    pub const HEADER: [&'static str; 2] = ["id", "name"];

    pub fn to_row(&self) -> [&str; 2] {
        [self.id.as_str(), self.name.as_str()]
    }
}

/// A completed pull request as returned by `/_apis/git/pullrequests`.
/// Every field listed here is required; reviewers are only counted.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequest {
    pub pull_request_id: u64,
    pub created_by: IdentityRef,
    pub creation_date: String,
    pub closed_date: String,
    pub repository: RepositoryRef,
    pub source_ref_name: String,
    pub target_ref_name: String,
    pub merge_status: String,
    pub reviewers: Vec<IgnoredAny>,
    pub url: String,
    pub last_merge_commit: CommitRef,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityRef {
    pub id: String,
    pub descriptor: String,
    pub unique_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RepositoryRef {
    pub name: String,
    pub project: ProjectRef,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProjectRef {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitRef {
    pub commit_id: String,
}

impl PullRequest {
    pub const HEADER: [&'static str; 14] = [
        "pullRequestId",
        "authorId",
        "authorDescriptor",
        "authorUsername",
        "creationDate",
        "closedDate",
        "repository",
        "project",
        "sourceRefName",
        "targetRefName",
        "mergeStatus",
        "reviewersCount",
        "url",
        "lastMergeCommit",
    ];

    pub fn to_row(&self) -> [String; 14] {
        [
            self.pull_request_id.to_string(),
            self.created_by.id.clone(),
            self.created_by.descriptor.clone(),
            self.created_by.unique_name.clone(),
            self.creation_date.clone(),
            self.closed_date.clone(),
            self.repository.name.clone(),
            self.repository.project.name.clone(),
            self.source_ref_name.clone(),
            self.target_ref_name.clone(),
            self.merge_status.clone(),
            self.reviewers.len().to_string(),
            self.url.clone(),
            self.last_merge_commit.commit_id.clone(),
        ]
    }
}
