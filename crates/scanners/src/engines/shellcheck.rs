//! Shell-lint adapter (shellcheck). One subprocess per `.sh`/`.bash` target;
//! a scan with zero shell targets returns empty without any missing-tool
//! diagnostic, even when the binary is absent.

use crate::core::{Finding, Position, Severity};
use crate::engines::process::run_with_timeout;
use crate::engines::{
    filter_by_extension, walk_files, EngineAdapter, EngineContext, EngineFailure,
};
use crate::text::relpath;
use serde::Deserialize;
use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

const TOOL: &str = "shellcheck";

pub struct ShellcheckEngine;

impl ShellcheckEngine {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ShellcheckEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineAdapter for ShellcheckEngine {
    fn id(&self) -> &'static str {
        TOOL
    }

    fn run(&self, ctx: &EngineContext<'_>) -> Result<Vec<Finding>, EngineFailure> {
        let targets: Vec<PathBuf> = match ctx.files {
            Some(files) => filter_by_extension(ctx.root, files, &[".sh", ".bash"]),
            None => walk_files(ctx.root, ctx.policy)
                .into_iter()
                .filter(|p| {
                    let name = p.to_string_lossy().to_ascii_lowercase();
                    name.ends_with(".sh") || name.ends_with(".bash")
                })
                .collect(),
        };

        if targets.is_empty() {
            return Ok(Vec::new());
        }

        let mut findings = Vec::new();
        for path in targets {
            let mut cmd = Command::new(TOOL);
            cmd.args(["-f", "json"]).arg(&path);

            let output = match run_with_timeout(
                TOOL,
                cmd,
                Duration::from_secs(ctx.policy.per_file_timeout_secs),
            ) {
                Ok(output) => output,
                // A missing binary fails the whole engine; per-file launch
                // problems become inline diagnostics and the loop continues.
                Err(failure @ EngineFailure::ToolMissing { .. }) => return Err(failure),
                Err(failure) => {
                    findings.push(failure.into_diagnostic(&path));
                    continue;
                }
            };

            let comments = match parse_comments(&output.stdout) {
                Ok(comments) => comments,
                Err(failure) => {
                    findings.push(failure.into_diagnostic(&path));
                    continue;
                }
            };

            for item in comments {
                let level = item.level.unwrap_or_else(|| "warning".to_string());
                let rule_id = match item.code {
                    Some(code) => format!("SHELLCHECK:SC{code}"),
                    None => "SHELLCHECK".to_string(),
                };
                let mut finding = Finding::new(
                    rule_id,
                    map_level(&level),
                    item.message
                        .unwrap_or_else(|| "ShellCheck finding".to_string()),
                    relpath(&path, ctx.root),
                    Position::new(item.line.unwrap_or(1).max(1) as usize, 1),
                )
                .with_engine(TOOL)
                .with_meta("level", level);
                if let Some(code) = item.code {
                    finding = finding.with_meta("code", code.to_string());
                }
                findings.push(finding);
            }
        }
        Ok(findings)
    }
}

fn map_level(level: &str) -> Severity {
    match level.to_ascii_lowercase().as_str() {
        "error" => Severity::High,
        "warning" => Severity::Medium,
        _ => Severity::Low,
    }
}

/// `shellcheck -f json` emits either a bare list of comments or an object
/// with a `comments` key, depending on version.
fn parse_comments(stdout: &str) -> Result<Vec<ShellcheckComment>, EngineFailure> {
    let raw = if stdout.trim().is_empty() { "[]" } else { stdout };
    let value: serde_json::Value =
        serde_json::from_str(raw).map_err(|e| EngineFailure::Parse {
            tool: TOOL,
            detail: e.to_string(),
        })?;
    let comments = match value {
        serde_json::Value::Array(_) => value,
        serde_json::Value::Object(ref map) => {
            map.get("comments").cloned().unwrap_or_else(|| serde_json::json!([]))
        }
        _ => serde_json::json!([]),
    };
    serde_json::from_value(comments).map_err(|e| EngineFailure::Parse {
        tool: TOOL,
        detail: e.to_string(),
    })
}

#[derive(Debug, Deserialize)]
struct ShellcheckComment {
    code: Option<u64>,
    level: Option<String>,
    message: Option<String>,
    line: Option<u64>,
}
