//! Secret-detection adapter (detect-secrets).

use crate::core::{Finding, Position, Severity};
use crate::engines::process::run_with_timeout;
use crate::engines::{EngineAdapter, EngineContext, EngineFailure};
use crate::text::{read_text, relpath, safe_snippet};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::process::Command;
use std::time::Duration;

const TOOL: &str = "detect-secrets";

pub struct DetectSecretsEngine;

impl DetectSecretsEngine {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DetectSecretsEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineAdapter for DetectSecretsEngine {
    fn id(&self) -> &'static str {
        TOOL
    }

    fn run(&self, ctx: &EngineContext<'_>) -> Result<Vec<Finding>, EngineFailure> {
        let mut cmd = Command::new(TOOL);
        cmd.args(["scan", "--all-files"]);
        match ctx.files {
            Some(files) => {
                cmd.args(files);
            }
            None => {
                cmd.arg(ctx.root);
            }
        }
        if ctx.root.is_dir() {
            cmd.current_dir(ctx.root);
        } else if let Some(parent) = ctx.root.parent() {
            if !parent.as_os_str().is_empty() {
                cmd.current_dir(parent);
            }
        }

        let output = run_with_timeout(
            TOOL,
            cmd,
            Duration::from_secs(ctx.policy.subprocess_timeout_secs),
        )?;

        let report: SecretsReport = serde_json::from_str(if output.stdout.trim().is_empty() {
            "{}"
        } else {
            &output.stdout
        })
        .map_err(|e| EngineFailure::Parse {
            tool: TOOL,
            detail: e.to_string(),
        })?;

        let mut findings = Vec::new();
        for (path, items) in report.results {
            for item in items {
                let secret_type = item.r#type.unwrap_or_else(|| "secret".to_string());
                let line = item.line_number.unwrap_or(1).max(1) as usize;
                let severity = severity_for_secret(&secret_type);

                let reported = Path::new(&path);
                let full = if reported.is_absolute() {
                    reported.to_path_buf()
                } else {
                    ctx.root.join(reported)
                };
                let snippet = read_text(&full)
                    .ok()
                    .map(|text| safe_snippet(&text, line, 2));
                let display_path = if reported.is_absolute() {
                    relpath(reported, ctx.root)
                } else {
                    path.clone()
                };

                findings.push(
                    Finding::new(
                        format!("DETECT-SECRETS:{secret_type}"),
                        severity,
                        format!("Possible secret detected: {secret_type}"),
                        display_path,
                        Position::new(line, 1),
                    )
                    .with_snippet(snippet)
                    .with_recommendation(
                        "Rotate and remove hardcoded secrets. Use a secrets manager.",
                    )
                    .with_engine(TOOL),
                );
            }
        }
        Ok(findings)
    }
}

fn severity_for_secret(secret_type: &str) -> Severity {
    let t = secret_type.to_ascii_lowercase();
    if ["token", "password", "apikey", "private"]
        .iter()
        .any(|k| t.contains(k))
    {
        Severity::Critical
    } else {
        Severity::High
    }
}

#[derive(Debug, Deserialize)]
struct SecretsReport {
    #[serde(default)]
    results: BTreeMap<String, Vec<SecretItem>>,
}

#[derive(Debug, Deserialize)]
struct SecretItem {
    r#type: Option<String>,
    line_number: Option<u64>,
}
