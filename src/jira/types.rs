use serde::Deserialize;
use serde_json::{Map, Number, Value};

/// `/rest/api/3/search` envelope. Only `id` is requested, `key` comes along anyway.
#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    pub issues: Vec<IssueRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IssueRef {
    pub id: String,
    pub key: String,
}

/// `/rest/dev-status/1.0/issue/detail` response filtered to pull requests.
#[derive(Debug, Deserialize)]
pub struct DevStatusResponse {
    pub detail: Vec<DevStatusDetail>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DevStatusDetail {
    pub pull_requests: Vec<LinkedPullRequest>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LinkedPullRequest {
    pub id: String,
    pub url: String,
    pub status: String,
}

/// Row of the linked-PR export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuePullRequest {
    pub issue_id: String,
    pub issue_key: String,
    pub pr_id: String,
    pub pr_url: String,
    pub pr_status: String,
}

impl IssuePullRequest {
    pub const HEADER: [&'static str; 5] = ["issueId", "issueKey", "prId", "prUrl", "prStatus"];

    pub fn new(issue: &IssueRef, pr: &LinkedPullRequest) -> Self {
        Self {
            issue_id: issue.id.clone(),
            issue_key: issue.key.clone(),
            pr_id: pr.id.clone(),
            pr_url: pr.url.clone(),
            pr_status: pr.status.clone(),
        }
    }

    pub fn to_row(&self) -> [&str; 5] {
        [
            self.issue_id.as_str(),
            self.issue_key.as_str(),
            self.pr_id.as_str(),
            self.pr_url.as_str(),
            self.pr_status.as_str(),
        ]
    }
}

/// Entry of `/rest/api/3/field`.
#[derive(Debug, Clone, Deserialize)]
pub struct FieldDefinition {
    pub id: String,
    pub name: String,
}

/// `/rest/api/3/issue/{key}` with its field values left untyped:
/// which fields exist depends on the Jira instance.
#[derive(Debug, Deserialize)]
pub struct Issue {
    pub id: String,
    #[serde(default)]
    pub fields: Map<String, Value>,
}

impl Issue {
    /// Current value of `field_id` in the same string form the input CSV uses:
    /// strings as-is, null or absent as empty, whole numbers without a
    /// fractional part, anything else as compact JSON.
    pub fn field_text(&self, field_id: &str) -> String {
        match self.fields.get(field_id) {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => number_text(n),
            Some(other) => other.to_string(),
        }
    }
}

/// Jira serves number fields as floats (`5.0`); render whole ones as `5`.
fn number_text(n: &Number) -> String {
    match n.as_f64() {
        Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
        _ => n.to_string(),
    }
}

/// Row of the set-field report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldChange {
    pub issue_id: String,
    pub issue_key: String,
    pub field_name: String,
    pub previous_value: String,
    pub new_value: String,
}

impl FieldChange {
    pub const HEADER: [&'static str; 5] = [
        "issueId",
        "issueKey",
        "fieldName",
        "previousValue",
        "newValue",
    ];

    pub fn is_change(&self) -> bool {
        self.previous_value != self.new_value
    }

    pub fn to_row(&self) -> [&str; 5] {
        [
            self.issue_id.as_str(),
            self.issue_key.as_str(),
            self.field_name.as_str(),
            self.previous_value.as_str(),
            self.new_value.as_str(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issue(fields: &str) -> Issue {
        serde_json::from_str(&format!(r#"{{"id": "10001", "key": "ABC-1", "fields": {fields}}}"#)).unwrap()
    }

    #[test]
    fn test_field_text_rendering() {
        let issue = issue(
            r#"{"summary": "Fix login", "customfield_1": 5, "customfield_2": null, "customfield_3": {"value": "High"}}"#,
        );
        assert_eq!(issue.field_text("summary"), "Fix login");
        assert_eq!(issue.field_text("customfield_1"), "5");
        assert_eq!(issue.field_text("customfield_2"), "");
        assert_eq!(issue.field_text("customfield_3"), r#"{"value":"High"}"#);
        assert_eq!(issue.field_text("absent"), "");
    }

    #[test]
    fn test_float_field_text() {
        let issue = issue(r#"{"whole": 5.0, "half": 2.5, "negative": -3.0, "zero": 0.0}"#);
        assert_eq!(issue.field_text("whole"), "5");
        assert_eq!(issue.field_text("half"), "2.5");
        assert_eq!(issue.field_text("negative"), "-3");
        assert_eq!(issue.field_text("zero"), "0");
    }

    #[test]
    fn test_dev_status_detail_shape() {
        let response: DevStatusResponse = serde_json::from_str(
            r##"{"errors": [], "detail": [{"pullRequests": [{"id": "#12", "url": "https://x/pr/12", "status": "MERGED", "name": "ignored"}], "branches": []}]}"##,
        )
        .unwrap();
        assert_eq!(response.detail[0].pull_requests[0].status, "MERGED");
    }

    #[test]
    fn test_search_issue_requires_key() {
        let result: Result<SearchResponse, _> = serde_json::from_str(r#"{"issues": [{"id": "1"}]}"#);
        assert!(result.is_err());
    }
}
