//! Line-oriented command session over a single registry
//!
//! Grammar, one statement per line:
//!
//! ```text
//! lock <user> <resource>
//! unlock <user> <resource>
//! list
//! sleep <duration>        # e.g. 500ms, 2s
//! # comment
//! ```

use std::time::Duration;

use anyhow::{Context, anyhow, bail};
use ras_core::acquisition::{Command, CommandResponse, LockTimeout, ResourceAcquisitionService};
use serde_json::json;

/// Output format (text or json)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// A parsed session line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    Commit {
        command: Command,
        user: String,
        resource: String,
    },
    List,
    Sleep(Duration),
    Empty,
}

/// Parse one line of input
pub fn parse_line(line: &str) -> anyhow::Result<Statement> {
    let tokens: Vec<&str> = line.split_whitespace().collect();

    let Some((&head, args)) = tokens.split_first() else {
        return Ok(Statement::Empty);
    };
    if head.starts_with('#') {
        return Ok(Statement::Empty);
    }

    match head.to_ascii_lowercase().as_str() {
        "list" => {
            if !args.is_empty() {
                bail!("Usage: list");
            }
            Ok(Statement::List)
        }
        "sleep" => {
            let [duration] = args else {
                bail!("Usage: sleep <duration>");
            };
            let timeout: LockTimeout = duration
                .parse()
                .with_context(|| format!("Invalid sleep duration: {}", duration))?;
            let delay = timeout
                .as_duration()
                .ok_or_else(|| anyhow!("Cannot sleep forever"))?;
            Ok(Statement::Sleep(delay))
        }
        _ => {
            let command: Command = head.parse()?;
            let [user, resource] = args else {
                bail!("Usage: {} <user> <resource>", command);
            };
            Ok(Statement::Commit {
                command,
                user: user.to_string(),
                resource: resource.to_string(),
            })
        }
    }
}

/// Executes statements against one in-process registry
pub struct Session {
    service: ResourceAcquisitionService<String>,
    format: OutputFormat,
}

impl Session {
    pub fn new(service: ResourceAcquisitionService<String>, format: OutputFormat) -> Self {
        Self { service, format }
    }

    pub fn service(&self) -> &ResourceAcquisitionService<String> {
        &self.service
    }

    /// Run one line, returning the text to print (if any)
    pub async fn execute(&self, line: &str) -> anyhow::Result<Option<String>> {
        match parse_line(line)? {
            Statement::Empty => Ok(None),
            Statement::Sleep(delay) => {
                tokio::time::sleep(delay).await;
                Ok(None)
            }
            Statement::List => self.render_list().map(Some),
            Statement::Commit {
                command,
                user,
                resource,
            } => {
                let response = self.service.commit(command, &user, resource)?;
                self.render_response(&response).map(Some)
            }
        }
    }

    fn render_response(&self, response: &CommandResponse<String>) -> anyhow::Result<String> {
        match self.format {
            OutputFormat::Text => Ok(response.to_string()),
            OutputFormat::Json => {
                serde_json::to_string(response).context("Failed to serialize response")
            }
        }
    }

    fn render_list(&self) -> anyhow::Result<String> {
        let resources = self.service.locked_resources();

        match self.format {
            OutputFormat::Text => {
                if resources.is_empty() {
                    return Ok("(no locked resources)".to_string());
                }
                let lines: Vec<String> = resources
                    .iter()
                    .map(|(key, resource)| {
                        let expires = resource
                            .expires_at()
                            .map(|at| at.format("%Y-%m-%dT%H:%M:%SZ").to_string())
                            .unwrap_or_else(|| "never".to_string());
                        format!("{} {} expires_at={}", key, resource, expires)
                    })
                    .collect();
                Ok(lines.join("\n"))
            }
            OutputFormat::Json => {
                let items: Vec<_> = resources
                    .iter()
                    .map(|(key, resource)| json!({ "key": key, "resource": resource }))
                    .collect();
                serde_json::to_string(&items).context("Failed to serialize lock list")
            }
        }
    }
}
