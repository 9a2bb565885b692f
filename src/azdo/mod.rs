pub mod types;

pub use types::{Project, PullRequest, ValueList};

use std::path::Path;
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::export::{CsvExport, ExportError};
use crate::http::{get_json, HttpError, HttpProvider};

#[derive(Debug, Error)]
pub enum AzdoError {
    #[error("Azure DevOps request failed: {0}")]
    Http(#[from] HttpError),

    #[error(transparent)]
    Export(#[from] ExportError),
}

/// Branches whose completed pull requests are exported, in query order.
pub const TARGET_BRANCHES: [&str; 2] = ["refs/heads/main", "refs/heads/master"];

/// `$top` for the pull-request query. There is no paging; anything past
/// this many results per branch is dropped by the server.
pub const PULL_REQUEST_PAGE_SIZE: u32 = 1500;

pub fn projects_url(base_url: &str) -> String {
    format!("{}/_apis/projects?api-version=7.0", base_url.trim_end_matches('/'))
}

/// Build the completed-PR search URL. Dates are passed through untouched.
pub fn pull_requests_url(base_url: &str, min_date: &str, max_date: &str, target_ref: &str) -> String {
    format!(
        "{}/_apis/git/pullrequests?api-version=7.1-preview.1\
         &searchCriteria.status=completed\
         &searchCriteria.queryTimeRangeType=closed\
         &searchCriteria.minTime={}\
         &searchCriteria.maxTime={}\
         &searchCriteria.targetRefName={}\
         &$top={}",
        base_url.trim_end_matches('/'),
        min_date,
        max_date,
        target_ref,
        PULL_REQUEST_PAGE_SIZE
    )
}

/// Write every project of the organization as an `id,name` row.
///
/// The output is created before the request, so it is truncated even when
/// the organization has no projects or the request fails.
#[instrument(skip(http))]
pub async fn export_projects(
    http: &dyn HttpProvider,
    base_url: &str,
    output: &Path,
) -> Result<usize, AzdoError> {
    let mut export = CsvExport::create(output, &Project::HEADER)?;

    let projects: ValueList<Project> = get_json(http, &projects_url(base_url)).await?;
    debug!(projects = projects.value.len(), "received project list");
    for project in &projects.value {
        export.write_row(project.to_row())?;
    }

    let rows = export.finish()?;
    info!(rows, "exported projects");
    Ok(rows)
}

/// Export completed pull requests closed between `min_date` and `max_date`,
/// one query per entry of [`TARGET_BRANCHES`], rows appended in query order.
///
/// Any response that does not match [`PullRequest`] aborts the whole export.
#[instrument(skip(http))]
pub async fn export_pull_requests(
    http: &dyn HttpProvider,
    base_url: &str,
    min_date: &str,
    max_date: &str,
    output: &Path,
) -> Result<usize, AzdoError> {
    let mut export = CsvExport::create(output, &PullRequest::HEADER)?;

    for target_ref in TARGET_BRANCHES {
        let url = pull_requests_url(base_url, min_date, max_date, target_ref);
        let pull_requests: ValueList<PullRequest> = get_json(http, &url).await?;
        debug!(target_ref, count = pull_requests.value.len(), "received pull requests");
        for pr in &pull_requests.value {
            export.write_row(pr.to_row())?;
        }
    }

    let rows = export.finish()?;
    info!(rows, "exported pull requests");
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::open_input;
    use crate::http::testing::FakeHttp;
    use pretty_assertions::assert_eq;
    use std::fs;

    const BASE: &str = "https://dev.azure.com/org";

    fn pr_json(id: u64, target: &str) -> String {
        format!(
            r#"{{
                "pullRequestId": {id},
                "createdBy": {{"id": "u-{id}", "descriptor": "d-{id}", "uniqueName": "dev{id}@example.com"}},
                "creationDate": "2024-01-01T00:00:00Z",
                "closedDate": "2024-01-02T00:00:00Z",
                "repository": {{"name": "repo{id}", "project": {{"name": "Platform"}}}},
                "sourceRefName": "refs/heads/topic-{id}",
                "targetRefName": "{target}",
                "mergeStatus": "succeeded",
                "reviewers": [],
                "url": "https://dev.azure.com/org/_apis/git/pullRequests/{id}",
                "lastMergeCommit": {{"commitId": "c{id}"}}
            }}"#
        )
    }

    fn column(path: &Path, name: &str) -> Vec<String> {
        let (columns, rows) = open_input(path).unwrap();
        rows.map(|r| columns.field(&r.unwrap(), name).unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_pull_requests_url() {
        assert_eq!(
            pull_requests_url("https://dev.azure.com/org/", "2024-01-01", "2024-02-01", "refs/heads/main"),
            "https://dev.azure.com/org/_apis/git/pullrequests?api-version=7.1-preview.1\
             &searchCriteria.status=completed&searchCriteria.queryTimeRangeType=closed\
             &searchCriteria.minTime=2024-01-01&searchCriteria.maxTime=2024-02-01\
             &searchCriteria.targetRefName=refs/heads/main&$top=1500"
        );
    }

    #[tokio::test]
    async fn test_export_projects_keeps_response_order() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("projects.csv");
        let http = FakeHttp::new().with(
            &projects_url(BASE),
            r#"{"count": 3, "value": [
                {"id": "p-3", "name": "Zeta", "state": "wellFormed"},
                {"id": "p-1", "name": "Alpha, Inc"},
                {"id": "p-2", "name": "Beta"}
            ]}"#,
        );

        let rows = export_projects(&http, BASE, &output).await.unwrap();
        assert_eq!(rows, 3);
        assert_eq!(column(&output, "id"), vec!["p-3", "p-1", "p-2"]);
        assert_eq!(column(&output, "name"), vec!["Zeta", "Alpha, Inc", "Beta"]);
    }

    #[tokio::test]
    async fn test_export_projects_empty_list_still_writes_header() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("projects.csv");
        fs::write(&output, "stale content\n").unwrap();
        let http = FakeHttp::new().with(&projects_url(BASE), r#"{"count": 0, "value": []}"#);

        assert_eq!(export_projects(&http, BASE, &output).await.unwrap(), 0);
        assert_eq!(fs::read_to_string(&output).unwrap(), "\"id\",\"name\"\n");
    }

    #[tokio::test]
    async fn test_export_projects_missing_name_is_shape_error() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("projects.csv");
        let http = FakeHttp::new().with(&projects_url(BASE), r#"{"value": [{"id": "p-1"}]}"#);

        let err = export_projects(&http, BASE, &output).await.unwrap_err();
        assert!(matches!(err, AzdoError::Http(HttpError::UnexpectedShape { .. })));
    }

    #[tokio::test]
    async fn test_export_pull_requests_main_then_master() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("prs.csv");
        let main_url = pull_requests_url(BASE, "a", "b", "refs/heads/main");
        let master_url = pull_requests_url(BASE, "a", "b", "refs/heads/master");
        let http = FakeHttp::new()
            .with(
                &main_url,
                &format!(
                    r#"{{"value": [{}, {}]}}"#,
                    pr_json(2, "refs/heads/main"),
                    pr_json(1, "refs/heads/main")
                ),
            )
            .with(
                &master_url,
                &format!(
                    r#"{{"value": [{}, {}]}}"#,
                    pr_json(3, "refs/heads/master"),
                    pr_json(2, "refs/heads/master")
                ),
            );

        let rows = export_pull_requests(&http, BASE, "a", "b", &output).await.unwrap();

        assert_eq!(rows, 4);
        assert_eq!(http.gets(), vec![main_url, master_url]);
        assert_eq!(column(&output, "pullRequestId"), vec!["2", "1", "3", "2"]);
        assert_eq!(
            column(&output, "targetRefName"),
            vec!["refs/heads/main", "refs/heads/main", "refs/heads/master", "refs/heads/master"]
        );
        assert_eq!(column(&output, "lastMergeCommit"), vec!["c2", "c1", "c3", "c2"]);
    }

    #[tokio::test]
    async fn test_export_pull_requests_is_repeatable() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("prs.csv");
        let http = FakeHttp::new()
            .with(
                &pull_requests_url(BASE, "a", "b", "refs/heads/main"),
                &format!(r#"{{"value": [{}]}}"#, pr_json(7, "refs/heads/main")),
            )
            .with(
                &pull_requests_url(BASE, "a", "b", "refs/heads/master"),
                r#"{"value": []}"#,
            );

        export_pull_requests(&http, BASE, "a", "b", &output).await.unwrap();
        let first = fs::read(&output).unwrap();
        export_pull_requests(&http, BASE, "a", "b", &output).await.unwrap();
        assert_eq!(fs::read(&output).unwrap(), first);
    }

    #[tokio::test]
    async fn test_export_pull_requests_missing_merge_commit_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("prs.csv");
        let broken = pr_json(9, "refs/heads/main").replace(r#""lastMergeCommit": {"commitId": "c9"}"#, r#""lastMergeCommit": {}"#);
        let http = FakeHttp::new().with(
            &pull_requests_url(BASE, "a", "b", "refs/heads/main"),
            &format!(r#"{{"value": [{}]}}"#, broken),
        );

        let err = export_pull_requests(&http, BASE, "a", "b", &output).await.unwrap_err();
        assert!(matches!(err, AzdoError::Http(HttpError::UnexpectedShape { .. })));
    }
}
