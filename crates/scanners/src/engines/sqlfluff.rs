//! SQL-lint adapter (sqlfluff). Restricted to `.sql` targets; an explicit
//! file list with no SQL files is silently an empty result, not an error.

use crate::core::{Finding, Position, Severity};
use crate::engines::process::run_with_timeout;
use crate::engines::{filter_by_extension, EngineAdapter, EngineContext, EngineFailure};
use crate::text::{read_text, relpath, safe_snippet};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

const TOOL: &str = "sqlfluff";

pub struct SqlfluffEngine;

impl SqlfluffEngine {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SqlfluffEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineAdapter for SqlfluffEngine {
    fn id(&self) -> &'static str {
        TOOL
    }

    fn run(&self, ctx: &EngineContext<'_>) -> Result<Vec<Finding>, EngineFailure> {
        let targets: Vec<PathBuf> = match ctx.files {
            Some(files) => {
                let sql = filter_by_extension(ctx.root, files, &[".sql"]);
                if sql.is_empty() {
                    return Ok(Vec::new());
                }
                sql
            }
            None => vec![ctx.root.to_path_buf()],
        };

        let mut cmd = Command::new(TOOL);
        cmd.args(["lint", "--format", "json"]);
        cmd.args(&targets);

        let output = run_with_timeout(
            TOOL,
            cmd,
            Duration::from_secs(ctx.policy.subprocess_timeout_secs),
        )?;

        let files: Vec<SqlfluffFile> = serde_json::from_str(if output.stdout.trim().is_empty() {
            "[]"
        } else {
            &output.stdout
        })
        .map_err(|e| EngineFailure::Parse {
            tool: TOOL,
            detail: e.to_string(),
        })?;

        let mut findings = Vec::new();
        for file in files {
            let path = file
                .filepath
                .unwrap_or_else(|| ctx.root.to_string_lossy().into_owned());
            for v in file.violations {
                let code = v.code.unwrap_or_else(|| "SQLFLUFF".to_string());
                let description = v
                    .description
                    .unwrap_or_else(|| "SQL lint issue".to_string());
                let line = v.line_no.unwrap_or(1).max(1) as usize;
                let column = v.line_pos.unwrap_or(1).max(1) as usize;
                // Style-rule families get medium; anything else is noise-level.
                let severity = if code.starts_with('L') {
                    Severity::Medium
                } else {
                    Severity::Low
                };

                let reported = Path::new(&path);
                let full = if reported.is_absolute() {
                    reported.to_path_buf()
                } else {
                    ctx.root.join(reported)
                };
                let snippet = read_text(&full)
                    .ok()
                    .map(|text| safe_snippet(&text, line, 2));

                findings.push(
                    Finding::new(
                        format!("SQLFLUFF:{code}"),
                        severity,
                        description,
                        relpath(&full, ctx.root),
                        Position::new(line, column),
                    )
                    .with_snippet(snippet)
                    .with_recommendation("Fix SQL linting issue or adjust sqlfluff config.")
                    .with_engine(TOOL),
                );
            }
        }
        Ok(findings)
    }
}

#[derive(Debug, Deserialize)]
struct SqlfluffFile {
    filepath: Option<String>,
    #[serde(default)]
    violations: Vec<SqlfluffViolation>,
}

#[derive(Debug, Deserialize)]
struct SqlfluffViolation {
    code: Option<String>,
    description: Option<String>,
    line_no: Option<u64>,
    line_pos: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ScanPolicy;

    #[test]
    fn test_explicit_list_without_sql_is_silently_empty() {
        // The binary is never invoked, so this holds even where sqlfluff is
        // not installed.
        let policy = ScanPolicy::default();
        let files = vec![PathBuf::from("a.py"), PathBuf::from("b.sh")];
        let ctx = EngineContext {
            root: Path::new("/tmp"),
            files: Some(&files),
            policy: &policy,
        };
        let findings = SqlfluffEngine::new().run(&ctx).unwrap();
        assert!(findings.is_empty());
    }

    #[test]
    fn test_violation_severity_by_code_family() {
        let raw = r#"[
            {
                "filepath": "q.sql",
                "violations": [
                    { "code": "L010", "description": "Keywords must be upper case", "line_no": 2, "line_pos": 1 },
                    { "code": "PRS", "description": "parse error", "line_no": 1, "line_pos": 1 }
                ]
            }
        ]"#;
        let files: Vec<SqlfluffFile> = serde_json::from_str(raw).unwrap();
        assert_eq!(files[0].violations.len(), 2);
        assert_eq!(files[0].violations[0].code.as_deref(), Some("L010"));
    }
}
