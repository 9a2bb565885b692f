use csv::StringRecord;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info, info_span, instrument, warn, Instrument};

use crate::export::{open_input, row_error, ColumnIndex, CsvExport, ExportError};
use crate::vcs::{parse_numstat, FileStat, VcsError, VersionControl};

#[derive(Debug, Error)]
pub enum GitLogError {
    #[error(transparent)]
    Export(#[from] ExportError),

    #[error("git log failed for pull request {pull_request_id} ({repository}@{commit}): {source}")]
    Log {
        pull_request_id: String,
        repository: String,
        commit: String,
        #[source]
        source: VcsError,
    },
}

/// Columns read from the pull-request export.
const INPUT_COLUMNS: [&str; 7] = [
    "pullRequestId",
    "authorUsername",
    "closedDate",
    "repository",
    "project",
    "targetRefName",
    "lastMergeCommit",
];

/// One changed file of one pull request's merge commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitLogEntry {
    pub pull_request_id: String,
    pub author_username: String,
    pub closed_date: String,
    pub repository: String,
    pub last_merge_commit: String,
    pub stat: FileStat,
}

impl GitLogEntry {
    pub const HEADER: [&'static str; 8] = [
        "pullRequestId",
        "authorUsername",
        "closedDate",
        "repository",
        "lastMergeCommit",
        "linesAdded",
        "linesRemoved",
        "filePath",
    ];

    pub fn to_row(&self) -> [&str; 8] {
        [
            self.pull_request_id.as_str(),
            self.author_username.as_str(),
            self.closed_date.as_str(),
            self.repository.as_str(),
            self.last_merge_commit.as_str(),
            self.stat.lines_added.as_str(),
            self.stat.lines_removed.as_str(),
            self.stat.path.as_str(),
        ]
    }
}

/// A pull-request row resolved into what git needs.
#[derive(Debug, Clone, PartialEq, Eq)]
struct MergedPullRequest {
    id: String,
    author_username: String,
    closed_date: String,
    /// Path-escaped; also the name of the local working copy.
    repository: String,
    clone_url: String,
    branch: String,
    merge_commit: String,
}

impl MergedPullRequest {
    fn from_row(base_url: &str, columns: &ColumnIndex, row: &StringRecord) -> Result<Self, ExportError> {
        let project = escape_path_segment(columns.field(row, "project")?);
        let repository = escape_path_segment(columns.field(row, "repository")?);
        let target_ref = columns.field(row, "targetRefName")?;

        Ok(Self {
            id: columns.field(row, "pullRequestId")?.to_string(),
            author_username: columns.field(row, "authorUsername")?.to_string(),
            closed_date: columns.field(row, "closedDate")?.to_string(),
            clone_url: format!("{}/{}/_git/{}", base_url.trim_end_matches('/'), project, repository),
            branch: target_ref
                .strip_prefix("refs/heads/")
                .unwrap_or(target_ref)
                .to_string(),
            merge_commit: columns.field(row, "lastMergeCommit")?.to_string(),
            repository,
        })
    }

    fn entry(&self, stat: FileStat) -> GitLogEntry {
        GitLogEntry {
            pull_request_id: self.id.clone(),
            author_username: self.author_username.clone(),
            closed_date: self.closed_date.clone(),
            repository: self.repository.clone(),
            last_merge_commit: self.merge_commit.clone(),
            stat,
        }
    }
}

/// Escape `name` for use as one URL path segment. Sub-delimiters that are
/// legal inside a segment (`$ & + : = @`) stay as they are, so the result
/// also names existing working copies.
fn escape_path_segment(name: &str) -> String {
    const KEPT: [(&str, &str); 6] = [
        ("%24", "$"),
        ("%26", "&"),
        ("%2B", "+"),
        ("%3A", ":"),
        ("%3D", "="),
        ("%40", "@"),
    ];
    KEPT.iter()
        .fold(urlencoding::encode(name).into_owned(), |escaped, (code, c)| {
            escaped.replace(code, c)
        })
}

/// Turn a pull-request export into per-file line statistics.
///
/// For each input row, in order: clone the target branch into
/// `repos_dir/<repository>` (a failed clone is logged and ignored, the
/// working copy usually exists from a previous run), then read the numstat
/// of the recorded merge commit. A failed log read aborts the export.
#[instrument(skip(vcs))]
pub async fn export_git_log(
    vcs: &dyn VersionControl,
    base_url: &str,
    input: &Path,
    output: &Path,
    repos_dir: &Path,
) -> Result<usize, GitLogError> {
    let (columns, rows) = open_input(input)?;
    let mut export = CsvExport::create(output, &GitLogEntry::HEADER)?;
    columns.require(&INPUT_COLUMNS)?;

    let mut pull_requests = 0usize;
    for row in rows {
        let row = row.map_err(|e| row_error(input, e))?;
        let pr = MergedPullRequest::from_row(base_url, &columns, &row)?;
        pull_requests += 1;

        let span = info_span!("pull_request", id = %pr.id, repository = %pr.repository);
        let entries = collect_entries(vcs, repos_dir, &pr).instrument(span).await?;
        for entry in &entries {
            export.write_row(entry.to_row())?;
        }
    }

    let rows = export.finish()?;
    info!(pull_requests, rows, "exported git log statistics");
    Ok(rows)
}

async fn collect_entries(
    vcs: &dyn VersionControl,
    repos_dir: &Path,
    pr: &MergedPullRequest,
) -> Result<Vec<GitLogEntry>, GitLogError> {
    if let Err(e) = vcs.clone_branch(&pr.clone_url, &pr.branch, repos_dir).await {
        warn!(url = %pr.clone_url, branch = %pr.branch, error = %e, "skipping clone");
    }

    let log_error = |source| GitLogError::Log {
        pull_request_id: pr.id.clone(),
        repository: pr.repository.clone(),
        commit: pr.merge_commit.clone(),
        source,
    };
    let output = vcs
        .log_numstat(&repos_dir.join(&pr.repository), &pr.merge_commit)
        .await
        .map_err(log_error)?;
    let stats = parse_numstat(&output).map_err(log_error)?;
    debug!(files = stats.len(), "read merge commit numstat");

    Ok(stats.into_iter().map(|stat| pr.entry(stat)).collect())
}
