mod azdo;
mod config;
mod export;
mod gitlog;
mod http;
mod jira;
mod vcs;

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use tracing::{error, info, info_span, Instrument};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::http::RestClient;
use crate::vcs::GitCli;

/// abacus: exports Azure DevOps and Jira engineering activity
/// (projects, pull requests, per-file commit statistics, linked issues) to CSV.
///
/// Credentials come from .abacus.toml or the AZDO_TOKEN, JIRA_USER and
/// JIRA_TOKEN environment variables.
#[derive(Parser, Debug)]
#[command(name = "abacus", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Retrieves a list of projects from the given Azure DevOps organization URL
    #[command(name = "projects")]
    Projects {
        /// URL of the Azure DevOps organization
        org_url: String,
        /// Output CSV path
        output: Option<PathBuf>,
    },

    /// Retrieves completed pull requests' metadata
    #[command(name = "pullrequests")]
    PullRequests {
        /// URL of the Azure DevOps organization
        org_url: String,
        /// Earliest closed date, passed to Azure DevOps as-is
        min_date: String,
        /// Latest closed date, passed to Azure DevOps as-is
        max_date: String,
        /// Output CSV path
        output: Option<PathBuf>,
    },

    /// Retrieves git log statistics for the repositories and branches in the input CSV
    #[command(name = "gitlogs")]
    GitLogs {
        /// Base git URL; repositories are cloned from <base>/<project>/_git/<repository>
        git_base_url: String,
        /// Pull-request CSV produced by `pullrequests`
        input: Option<PathBuf>,
        /// Output CSV path
        output: Option<PathBuf>,
        /// Local folder holding the git working copies
        repos_dir: Option<PathBuf>,
    },

    /// Retrieves the pull requests linked to the Jira issues matching a JQL query
    #[command(name = "jira-prs")]
    JiraPrs {
        /// URL of the Jira instance
        jira_url: String,
        /// JQL filter
        jql: String,
        /// Output CSV path
        output: Option<PathBuf>,
    },

    /// Sets a Jira field on the issues listed in the input CSV, where it differs
    #[command(name = "jira-set")]
    JiraSet {
        /// URL of the Jira instance
        jira_url: String,
        /// Display name of the field; also the input column holding the new values
        field_name: String,
        /// Input CSV with an issueKey column and a <field-name> column
        input: Option<PathBuf>,
        /// Output CSV path
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    // Missing or unknown arguments print usage and are not an error.
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            e.print()?;
            return Ok(());
        }
    };

    info!("loading configuration");
    let config = Config::load()?;

    let span = info_span!("command", command = command_name(&cli.command));
    match run(cli.command, &config).instrument(span).await {
        Ok((rows, path)) => {
            println!("{} wrote {} rows to {}", "✓".green(), rows, path.display());
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "command failed");
            eprintln!("{} {}", "error:".red().bold(), e);
            std::process::exit(1);
        }
    }
}

fn command_name(command: &Command) -> &'static str {
    match command {
        Command::Projects { .. } => "projects",
        Command::PullRequests { .. } => "pullrequests",
        Command::GitLogs { .. } => "gitlogs",
        Command::JiraPrs { .. } => "jira-prs",
        Command::JiraSet { .. } => "jira-set",
    }
}

/// Run one command and return the number of rows written and where.
async fn run(
    command: Command,
    config: &Config,
) -> Result<(usize, PathBuf), Box<dyn std::error::Error>> {
    let paths = &config.paths;
    match command {
        Command::Projects { org_url, output } => {
            let output = output.unwrap_or_else(|| paths.projects.clone());
            let client = RestClient::new(config.azdo_auth());
            let rows = azdo::export_projects(&client, &org_url, &output).await?;
            Ok((rows, output))
        }
        Command::PullRequests {
            org_url,
            min_date,
            max_date,
            output,
        } => {
            let output = output.unwrap_or_else(|| paths.pull_requests.clone());
            let client = RestClient::new(config.azdo_auth());
            let rows =
                azdo::export_pull_requests(&client, &org_url, &min_date, &max_date, &output)
                    .await?;
            Ok((rows, output))
        }
        Command::GitLogs {
            git_base_url,
            input,
            output,
            repos_dir,
        } => {
            let input = input.unwrap_or_else(|| paths.pull_requests.clone());
            let output = output.unwrap_or_else(|| paths.git_log.clone());
            let repos_dir = repos_dir.unwrap_or_else(|| paths.repos.clone());
            let rows =
                gitlog::export_git_log(&GitCli, &git_base_url, &input, &output, &repos_dir).await?;
            Ok((rows, output))
        }
        Command::JiraPrs {
            jira_url,
            jql,
            output,
        } => {
            let output = output.unwrap_or_else(|| paths.jira_prs.clone());
            let client = RestClient::new(config.jira_auth());
            let rows = jira::export_linked_pull_requests(&client, &jira_url, &jql, &output).await?;
            Ok((rows, output))
        }
        Command::JiraSet {
            jira_url,
            field_name,
            input,
            output,
        } => {
            let input = input.unwrap_or_else(|| paths.jira_set_input.clone());
            let output = output.unwrap_or_else(|| paths.jira_set_output.clone());
            let client = RestClient::new(config.jira_auth());
            let rows = jira::set_field(&client, &jira_url, &field_name, &input, &output).await?;
            Ok((rows, output))
        }
    }
}
