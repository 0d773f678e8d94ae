//! Semantic-review engine (stage 2). Reviews each file with an LLM backend,
//! conditioned on stage-1 results: files that already have findings get an
//! enrichment prompt restricted to NEW issues, files with none get a full
//! gap-filling review. Per-file failures become per-file diagnostics and
//! never stop the remaining files.

use crate::core::{Finding, Position, ScanPolicy, Severity};
use crate::engines::{diagnostic_path, walk_files};
use crate::llm::prompts::{
    enrichment_prompt, gap_filling_prompt, BLOCK_DELIMITER, NO_ADDITIONAL_ISSUES_SENTINEL,
    NO_ISSUES_SENTINEL,
};
use crate::llm::LlmBackend;
use crate::text::{read_text, relpath, safe_snippet};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

const CODE_EXTENSIONS: &[&str] = &[
    ".py", ".js", ".ts", ".java", ".go", ".rb", ".php", ".cs", ".sh", ".bash", ".sql", ".tf",
    ".yaml", ".yml", ".json", ".md", ".txt",
];

pub struct LlmReviewEngine {
    backend: Arc<dyn LlmBackend>,
}

impl LlmReviewEngine {
    pub fn new(backend: Arc<dyn LlmBackend>) -> Self {
        Self { backend }
    }

    /// Review the working set sequentially. Existing stage-1 findings are
    /// read-only context selecting the per-file prompting mode.
    pub async fn run(
        &self,
        root: &Path,
        files: Option<&[PathBuf]>,
        policy: &ScanPolicy,
        existing: &[Finding],
    ) -> Vec<Finding> {
        let mut findings = Vec::new();

        if !self.backend.is_available().await {
            findings.push(
                Finding::new(
                    "LLM_ENGINE_NOT_READY",
                    Severity::Low,
                    "LLM backend not available. Skipping semantic code review.",
                    diagnostic_path(root),
                    Position::default(),
                )
                .with_recommendation(self.backend.setup_hint())
                .with_engine("llm"),
            );
            return findings;
        }

        let scan_files = self.resolve_files(root, files, policy);
        let by_file = group_by_file(root, existing);

        info!(count = scan_files.len(), "semantic review starting");
        for file_path in scan_files {
            let rel = relpath(&file_path, root);

            match std::fs::metadata(&file_path) {
                Ok(meta) if meta.len() > policy.llm.max_file_bytes => {
                    debug!(path = %rel, bytes = meta.len(), "skipping oversized file");
                    continue;
                }
                Ok(_) => {}
                Err(_) => continue,
            }
            let Ok(code) = read_text(&file_path) else {
                continue;
            };
            if code.trim().is_empty() {
                debug!(path = %rel, "skipping empty file");
                continue;
            }

            let prior = by_file.get(&file_path).map(Vec::as_slice).unwrap_or(&[]);
            let prompt = if prior.is_empty() {
                gap_filling_prompt(&code)
            } else {
                enrichment_prompt(&code, prior)
            };

            let response = self
                .backend
                .generate(&prompt, policy.llm.max_tokens, policy.llm.temperature)
                .await;

            match response {
                Ok(text) => {
                    let file_findings = parse_review_response(&text, &rel, &code);
                    debug!(path = %rel, count = file_findings.len(), "review complete");
                    findings.extend(file_findings);
                }
                Err(e) => {
                    findings.push(
                        Finding::new(
                            "LLM_ENGINE_REVIEW_ERROR",
                            Severity::Low,
                            format!("Semantic review failed for {rel}: {e}"),
                            rel.clone(),
                            Position::default(),
                        )
                        .with_recommendation(
                            "Check the LLM backend configuration and file accessibility.",
                        )
                        .with_engine("llm"),
                    );
                }
            }
        }
        findings
    }

    fn resolve_files(
        &self,
        root: &Path,
        files: Option<&[PathBuf]>,
        policy: &ScanPolicy,
    ) -> Vec<PathBuf> {
        match files {
            Some(files) => files
                .iter()
                .map(|f| {
                    if f.is_absolute() {
                        f.clone()
                    } else {
                        root.join(f)
                    }
                })
                .filter(|f| f.is_file())
                .collect(),
            None if root.is_file() => vec![root.to_path_buf()],
            None => walk_files(root, policy)
                .into_iter()
                .filter(|p| is_code_file(p))
                .collect(),
        }
    }
}

fn is_code_file(path: &Path) -> bool {
    if path.file_name().and_then(|n| n.to_str()) == Some("Dockerfile") {
        return true;
    }
    let name = path.to_string_lossy().to_ascii_lowercase();
    CODE_EXTENSIONS.iter().any(|ext| name.ends_with(ext))
}

/// Group stage-1 findings by the absolute path they refer to, so each file's
/// prompting mode can be chosen with one lookup.
fn group_by_file<'a>(root: &Path, existing: &'a [Finding]) -> HashMap<PathBuf, Vec<&'a Finding>> {
    let root_dir = if root.is_dir() {
        root.to_path_buf()
    } else {
        root.parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| root.to_path_buf())
    };
    let mut map: HashMap<PathBuf, Vec<&Finding>> = HashMap::new();
    for finding in existing {
        let reported = Path::new(&finding.path);
        let abs = if reported.is_absolute() {
            reported.to_path_buf()
        } else if finding.path == "." {
            root.to_path_buf()
        } else {
            root_dir.join(reported)
        };
        map.entry(abs).or_default().push(finding);
    }
    map
}

/// Parse one review response into findings. Sentinel responses mean a clean
/// file; malformed blocks are dropped individually without aborting the rest.
pub fn parse_review_response(response: &str, file_path: &str, code: &str) -> Vec<Finding> {
    let mut findings = Vec::new();

    if response.contains(NO_ISSUES_SENTINEL) || response.contains(NO_ADDITIONAL_ISSUES_SENTINEL) {
        return findings;
    }

    for block in response.split(BLOCK_DELIMITER) {
        let block = block.trim();
        if block.is_empty() || !block.contains("VULNERABILITY:") {
            continue;
        }

        let mut fields: HashMap<String, String> = HashMap::new();
        for line in block.lines() {
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let key = key.trim().to_ascii_uppercase();
            if matches!(
                key.as_str(),
                "VULNERABILITY" | "SEVERITY" | "LINE" | "DESCRIPTION" | "RECOMMENDATION"
            ) {
                fields.insert(key, value.trim().to_string());
            }
        }

        let (Some(title), Some(severity_token), Some(line_token)) = (
            fields.get("VULNERABILITY"),
            fields.get("SEVERITY"),
            fields.get("LINE"),
        ) else {
            continue;
        };

        let severity = match severity_token.to_ascii_uppercase().as_str() {
            "CRITICAL" => Severity::Critical,
            "HIGH" => Severity::High,
            "MEDIUM" => Severity::Medium,
            "LOW" => Severity::Low,
            _ => Severity::Medium,
        };
        let line = line_token
            .trim()
            .parse::<usize>()
            .unwrap_or(1)
            .max(1);

        let rule_suffix = title.replace(' ', "_").to_ascii_uppercase();
        let message = fields
            .get("DESCRIPTION")
            .cloned()
            .unwrap_or_else(|| title.clone());

        let mut finding = Finding::new(
            format!("LLM_REVIEW:{rule_suffix}"),
            severity,
            message,
            file_path,
            Position::new(line, 1),
        )
        .with_snippet(Some(safe_snippet(code, line, 2)))
        .with_engine("llm")
        .with_meta("source", "code_review");
        if let Some(recommendation) = fields.get("RECOMMENDATION") {
            finding = finding.with_recommendation(recommendation.clone());
        }
        findings.push(finding);
    }

    findings
}
