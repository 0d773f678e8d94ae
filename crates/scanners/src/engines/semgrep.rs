//! Pattern-rule engine adapter (Semgrep).
//!
//! Invokes the external binary with one or more rule-pack configs and maps
//! its JSON results into the shared finding model. Exit codes 0 and 1 mean
//! "ran, with/without findings"; the documented no-targets code triggers a
//! one-shot retry with the generic `auto` pack plus an advisory diagnostic.

use crate::core::{Finding, Position, Severity};
use crate::engines::process::run_with_timeout;
use crate::engines::{diagnostic_path, EngineAdapter, EngineContext, EngineFailure};
use crate::text::{read_text, relpath, safe_snippet};
use serde::Deserialize;
use std::path::Path;
use std::process::Command;
use std::time::Duration;
use tracing::warn;

const TOOL: &str = "semgrep";
const NO_TARGETS_EXIT: i32 = 7;
const FALLBACK_CONFIG: &str = "auto";

pub struct SemgrepEngine {
    config: String,
}

impl SemgrepEngine {
    pub fn new(config: impl Into<String>) -> Self {
        Self {
            config: config.into(),
        }
    }

    fn invoke(
        &self,
        configs: &[String],
        ctx: &EngineContext<'_>,
    ) -> Result<crate::engines::process::CommandOutput, EngineFailure> {
        let mut cmd = Command::new(TOOL);
        cmd.args(["--json", "--quiet"]);
        for cfg in configs {
            cmd.arg(format!("--config={cfg}"));
        }
        match ctx.files {
            Some(files) => {
                cmd.args(files);
            }
            None => {
                cmd.arg(ctx.root);
            }
        }
        if let Some(cwd) = working_dir(ctx.root) {
            cmd.current_dir(cwd);
        }
        run_with_timeout(
            TOOL,
            cmd,
            Duration::from_secs(ctx.policy.subprocess_timeout_secs),
        )
    }

    fn parse(&self, stdout: &str, root: &Path) -> Result<Vec<Finding>, EngineFailure> {
        let report: SemgrepReport = serde_json::from_str(if stdout.trim().is_empty() {
            "{}"
        } else {
            stdout
        })
        .map_err(|e| EngineFailure::Parse {
            tool: TOOL,
            detail: e.to_string(),
        })?;

        let mut findings = Vec::with_capacity(report.results.len());
        for r in report.results {
            let path = r.path.unwrap_or_else(|| root.to_string_lossy().into_owned());
            let check_id = r.check_id.unwrap_or_else(|| "SEMGREP_RULE".to_string());
            let severity = map_severity(r.extra.severity.as_deref().unwrap_or(""));
            let message = r
                .extra
                .message
                .unwrap_or_else(|| "Semgrep finding".to_string());
            let line = r.start.line.unwrap_or(1).max(1) as usize;
            let column = r.start.col.unwrap_or(1).max(1) as usize;

            let reported = Path::new(&path);
            let (display_path, full_path) = if reported.is_absolute() {
                (relpath(reported, root), reported.to_path_buf())
            } else {
                (path.clone(), resolve_root(root).join(reported))
            };
            let snippet = read_text(&full_path)
                .ok()
                .map(|text| safe_snippet(&text, line, 2));

            findings.push(
                Finding::new(
                    format!("SEMGREP:{check_id}"),
                    severity,
                    message,
                    display_path,
                    Position::new(line, column),
                )
                .with_snippet(snippet)
                .with_engine(TOOL),
            );
        }
        Ok(findings)
    }
}

impl EngineAdapter for SemgrepEngine {
    fn id(&self) -> &'static str {
        TOOL
    }

    fn run(&self, ctx: &EngineContext<'_>) -> Result<Vec<Finding>, EngineFailure> {
        let mut configs: Vec<String> = self
            .config
            .split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .collect();
        if configs.is_empty() {
            configs.push(FALLBACK_CONFIG.to_string());
        }

        let output = self.invoke(&configs, ctx)?;
        let mut findings = Vec::new();

        if ![0, 1, NO_TARGETS_EXIT].contains(&output.exit_code) {
            // Unexpected exit is advisory; any parseable results still count.
            warn!(code = output.exit_code, "semgrep exited unexpectedly");
            findings.push(
                EngineFailure::UnexpectedExit {
                    tool: TOOL,
                    code: output.exit_code,
                    stderr: truncate(&output.stderr, 200),
                }
                .into_diagnostic(ctx.root),
            );
        }

        let mut parsed = self.parse(&output.stdout, ctx.root)?;

        if output.exit_code == NO_TARGETS_EXIT
            && parsed.is_empty()
            && configs != [FALLBACK_CONFIG.to_string()]
        {
            findings.push(
                Finding::new(
                    "OSS_ENGINE_SEMGREP_FALLBACK",
                    Severity::Low,
                    format!(
                        "No applicable targets for configured rule packs ({}); retried with the '{}' pack. Coverage may be reduced.",
                        configs.join(","),
                        FALLBACK_CONFIG
                    ),
                    diagnostic_path(ctx.root),
                    Position::default(),
                )
                .with_recommendation("Point --semgrep-config at rule packs matching the scanned languages.")
                .with_engine(TOOL),
            );
            let retry = self.invoke(&[FALLBACK_CONFIG.to_string()], ctx)?;
            parsed = self.parse(&retry.stdout, ctx.root)?;
        }

        findings.extend(parsed);
        Ok(findings)
    }
}

fn map_severity(level: &str) -> Severity {
    match level.trim().to_ascii_uppercase().as_str() {
        "CRITICAL" => Severity::Critical,
        "ERROR" | "HIGH" => Severity::High,
        "WARNING" | "MEDIUM" => Severity::Medium,
        _ => Severity::Low,
    }
}

fn working_dir(root: &Path) -> Option<&Path> {
    if root.is_dir() {
        Some(root)
    } else {
        root.parent().filter(|p| !p.as_os_str().is_empty())
    }
}

fn resolve_root(root: &Path) -> &Path {
    working_dir(root).unwrap_or(root)
}

fn truncate(s: &str, max_len: usize) -> String {
    let trimmed = s.trim();
    if trimmed.len() <= max_len {
        trimmed.to_string()
    } else {
        let mut end = max_len;
        while end > 0 && !trimmed.is_char_boundary(end) {
            end -= 1;
        }
        trimmed[..end].to_string()
    }
}

#[derive(Debug, Deserialize)]
struct SemgrepReport {
    #[serde(default)]
    results: Vec<SemgrepResult>,
}

#[derive(Debug, Deserialize)]
struct SemgrepResult {
    path: Option<String>,
    check_id: Option<String>,
    #[serde(default)]
    extra: SemgrepExtra,
    #[serde(default)]
    start: SemgrepPos,
}

#[derive(Debug, Default, Deserialize)]
struct SemgrepExtra {
    severity: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SemgrepPos {
    line: Option<u64>,
    col: Option<u64>,
}
