//! Engine adapters: one wrapper per detection engine, external process or
//! in-process check, all conforming to the same run/parse/translate contract.
//!
//! An adapter never panics and never aborts the pipeline. Whole-engine
//! failures surface as an `EngineFailure` that the orchestrator folds into a
//! single low-severity diagnostic finding; partial failures (one file out of
//! many) become inline diagnostics in the adapter's own result list.

pub mod detect_secrets;
pub mod llm_review;
pub mod process;
pub mod semgrep;
pub mod shellcheck;
pub mod sql_strict;
pub mod sqlfluff;

pub use detect_secrets::DetectSecretsEngine;
pub use llm_review::LlmReviewEngine;
pub use semgrep::SemgrepEngine;
pub use shellcheck::ShellcheckEngine;
pub use sql_strict::SqlStrictEngine;
pub use sqlfluff::SqlfluffEngine;

use crate::core::{Finding, Position, ScanPolicy, Severity};
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

/// Inputs shared by every stage-1 adapter invocation. `files` is the combined
/// working set (real targets plus synthesized temp files); `None` means the
/// adapter resolves its own targets from `root`.
pub struct EngineContext<'a> {
    pub root: &'a Path,
    pub files: Option<&'a [PathBuf]>,
    pub policy: &'a ScanPolicy,
}

pub trait EngineAdapter {
    fn id(&self) -> &'static str;

    fn run(&self, ctx: &EngineContext<'_>) -> Result<Vec<Finding>, EngineFailure>;
}

/// Whole-engine failure taxonomy. Each variant maps onto exactly one
/// diagnostic finding in the reserved `OSS_ENGINE_*` namespace.
#[derive(Debug, Error)]
pub enum EngineFailure {
    #[error("{tool} is not installed or not in PATH")]
    ToolMissing { tool: &'static str },

    #[error("failed to run {tool}: {detail}")]
    Execution { tool: &'static str, detail: String },

    #[error("{tool} timed out after {seconds}s")]
    Timeout { tool: &'static str, seconds: u64 },

    #[error("failed to parse {tool} output: {detail}")]
    Parse { tool: &'static str, detail: String },

    #[error("{tool} exited with code {code}: {stderr}")]
    UnexpectedExit {
        tool: &'static str,
        code: i32,
        stderr: String,
    },
}

impl EngineFailure {
    pub fn tool(&self) -> &'static str {
        match self {
            Self::ToolMissing { tool }
            | Self::Execution { tool, .. }
            | Self::Timeout { tool, .. }
            | Self::Parse { tool, .. }
            | Self::UnexpectedExit { tool, .. } => tool,
        }
    }

    /// Fold this failure into the single low-severity diagnostic finding the
    /// pipeline reports in place of the engine's results.
    pub fn into_diagnostic(self, root: &Path) -> Finding {
        let tool_tag = self.tool().to_ascii_uppercase().replace('-', "_");
        let rule_id = match &self {
            Self::ToolMissing { .. } => format!("OSS_ENGINE_MISSING_{tool_tag}"),
            Self::Execution { .. } | Self::Timeout { .. } => {
                format!("OSS_ENGINE_{tool_tag}_ERROR")
            }
            Self::Parse { .. } => format!("OSS_ENGINE_{tool_tag}_PARSE_ERROR"),
            Self::UnexpectedExit { .. } => format!("OSS_ENGINE_{tool_tag}_NONZERO"),
        };
        let recommendation = match &self {
            Self::ToolMissing { .. } => install_hint(self.tool()),
            Self::Execution { .. } | Self::Timeout { .. } => {
                "Verify the tool installation and permissions."
            }
            Self::Parse { .. } => "Update the tool and retry.",
            Self::UnexpectedExit { .. } => "Check the tool configuration and rerun.",
        };
        Finding::new(
            rule_id,
            Severity::Low,
            self.to_string(),
            diagnostic_path(root),
            Position::default(),
        )
        .with_recommendation(recommendation)
        .with_engine(self.tool())
    }
}

fn install_hint(tool: &str) -> &'static str {
    match tool {
        "semgrep" => "Install semgrep (pipx install semgrep) or drop it from --tools.",
        "detect-secrets" => "Install detect-secrets (pipx install detect-secrets).",
        "sqlfluff" => "Install sqlfluff (pipx install sqlfluff).",
        "shellcheck" => "Install shellcheck (apt/brew install shellcheck).",
        _ => "Install the tool or remove it from the tool list.",
    }
}

/// Diagnostics anchor to the scan root, rendered relative to the working
/// directory like every other reported path.
pub(crate) fn diagnostic_path(root: &Path) -> String {
    match std::env::current_dir() {
        Ok(cwd) => crate::text::relpath(root, &cwd),
        Err(_) => root.to_string_lossy().into_owned(),
    }
}

/// Walk `root` collecting files, skipping the policy's excluded directories.
pub fn walk_files(root: &Path, policy: &ScanPolicy) -> Vec<PathBuf> {
    WalkDir::new(root)
        .into_iter()
        .filter_entry(|entry| {
            // The root itself is never excluded, whatever it is named.
            if entry.file_type().is_dir() && entry.depth() > 0 {
                let name = entry.file_name().to_string_lossy();
                !policy.is_excluded_dir(&name)
            } else {
                true
            }
        })
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .collect()
}

/// Restrict a target list to the given extensions (lowercase, with dot).
pub(crate) fn filter_by_extension(
    root: &Path,
    files: &[PathBuf],
    extensions: &[&str],
) -> Vec<PathBuf> {
    files
        .iter()
        .filter(|f| {
            let name = f.to_string_lossy().to_ascii_lowercase();
            extensions.iter().any(|ext| name.ends_with(ext))
        })
        .map(|f| {
            if f.is_absolute() {
                f.clone()
            } else {
                root.join(f)
            }
        })
        .collect()
}
