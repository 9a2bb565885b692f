pub mod types;

pub use types::{
    DevStatusResponse, FieldChange, FieldDefinition, Issue, IssuePullRequest, IssueRef,
    SearchResponse,
};

use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::export::{open_input, row_error, CsvExport, ExportError};
use crate::http::{get_json, HttpError, HttpProvider};

#[derive(Debug, Error)]
pub enum JiraError {
    #[error("Jira request failed: {0}")]
    Http(#[from] HttpError),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error("Jira has no field named {0:?}")]
    UnknownField(String),
}

/// Upper bound on issues returned by one search. No paging beyond it.
pub const SEARCH_MAX_RESULTS: u32 = 500;

pub fn search_url(base_url: &str, jql: &str) -> String {
    format!(
        "{}/rest/api/3/search?maxResults={}&fields=id&jql={}",
        base_url.trim_end_matches('/'),
        SEARCH_MAX_RESULTS,
        urlencoding::encode(jql)
    )
}

pub fn dev_status_url(base_url: &str, issue_id: &str) -> String {
    format!(
        "{}/rest/dev-status/1.0/issue/detail?issueId={}&applicationType=GitForJiraCloud&dataType=pullrequest",
        base_url.trim_end_matches('/'),
        urlencoding::encode(issue_id)
    )
}

pub fn fields_url(base_url: &str) -> String {
    format!("{}/rest/api/3/field", base_url.trim_end_matches('/'))
}

pub fn issue_url(base_url: &str, issue_key: &str) -> String {
    format!(
        "{}/rest/api/3/issue/{}",
        base_url.trim_end_matches('/'),
        urlencoding::encode(issue_key)
    )
}

/// Export the pull requests linked to every issue matching `jql`.
///
/// The search itself must succeed. Issues whose dev-status lookup fails or
/// lists no pull requests are logged and skipped.
#[instrument(skip(http))]
pub async fn export_linked_pull_requests(
    http: &dyn HttpProvider,
    base_url: &str,
    jql: &str,
    output: &Path,
) -> Result<usize, JiraError> {
    let search: SearchResponse = get_json(http, &search_url(base_url, jql)).await?;
    info!(issues = search.issues.len(), "search returned issues");

    let mut export = CsvExport::create(output, &IssuePullRequest::HEADER)?;
    let mut skipped = 0usize;
    for issue in &search.issues {
        match linked_pull_requests(http, base_url, issue).await {
            Ok(links) if links.is_empty() => {
                warn!(id = %issue.id, key = %issue.key, "no pull request found for issue");
                skipped += 1;
            }
            Ok(links) => {
                for link in &links {
                    export.write_row(link.to_row())?;
                }
            }
            Err(e) => {
                warn!(id = %issue.id, key = %issue.key, error = %e, "no pull request found for issue");
                skipped += 1;
            }
        }
    }

    let rows = export.finish()?;
    info!(rows, skipped, "exported linked pull requests");
    Ok(rows)
}

async fn linked_pull_requests(
    http: &dyn HttpProvider,
    base_url: &str,
    issue: &IssueRef,
) -> Result<Vec<IssuePullRequest>, HttpError> {
    let status: DevStatusResponse = get_json(http, &dev_status_url(base_url, &issue.id)).await?;
    Ok(status
        .detail
        .iter()
        .flat_map(|detail| detail.pull_requests.iter())
        .map(|pr| IssuePullRequest::new(issue, pr))
        .collect())
}

/// Set `field_name` on every issue listed in `input` to the value in that
/// issue's row, skipping the update when the issue already holds it.
///
/// The input needs an `issueKey` column and a column named `field_name`.
/// Every row is reported with its previous and requested value whether or
/// not an update was sent. Any failure aborts the run.
#[instrument(skip(http))]
pub async fn set_field(
    http: &dyn HttpProvider,
    base_url: &str,
    field_name: &str,
    input: &Path,
    output: &Path,
) -> Result<usize, JiraError> {
    let field_id = resolve_field_id(http, base_url, field_name).await?;
    debug!(field_id = %field_id, "resolved field");

    let (columns, rows) = open_input(input)?;
    let mut export = CsvExport::create(output, &FieldChange::HEADER)?;
    columns.require(&["issueKey", field_name])?;

    let mut updated = 0usize;
    for row in rows {
        let row = row.map_err(|e| row_error(input, e))?;
        let issue_key = columns.field(&row, "issueKey")?;
        let desired = columns.field(&row, field_name)?;

        let issue: Issue = get_json(http, &issue_url(base_url, issue_key)).await?;
        let change = FieldChange {
            issue_id: issue.id.clone(),
            issue_key: issue_key.to_string(),
            field_name: field_name.to_string(),
            previous_value: issue.field_text(&field_id),
            new_value: desired.to_string(),
        };

        if change.is_change() {
            let body = json!({ "fields": { field_id.as_str(): field_value(desired) } });
            http.put_json(&issue_url(base_url, issue_key), &body).await?;
            info!(key = %issue_key, previous = %change.previous_value, new = %change.new_value, "updated issue");
            updated += 1;
        } else {
            debug!(key = %issue_key, "value already set");
        }
        export.write_row(change.to_row())?;
    }

    let rows = export.finish()?;
    info!(rows, updated, "field update finished");
    Ok(rows)
}

async fn resolve_field_id(
    http: &dyn HttpProvider,
    base_url: &str,
    field_name: &str,
) -> Result<String, JiraError> {
    let fields: Vec<FieldDefinition> = get_json(http, &fields_url(base_url)).await?;
    let by_name: HashMap<String, String> = fields.into_iter().map(|f| (f.name, f.id)).collect();
    by_name
        .get(field_name)
        .cloned()
        .ok_or_else(|| JiraError::UnknownField(field_name.to_string()))
}

/// The cell as JSON when it parses as JSON (numbers, objects, quoted
/// strings), otherwise as a plain JSON string.
fn field_value(cell: &str) -> Value {
    serde_json::from_str(cell).unwrap_or_else(|_| Value::String(cell.to_string()))
}
