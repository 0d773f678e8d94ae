//! Pipeline orchestrator: resolves scan targets, synthesizes the temp-file
//! working set (notebook cells, embedded snippets, typed copies), runs the
//! engine adapters in two deterministic stages, and remaps findings produced
//! on synthesized files back onto their origin files and lines.

use crate::core::{Finding, ScanPolicy};
use crate::engines::{
    walk_files, DetectSecretsEngine, EngineAdapter, EngineContext, LlmReviewEngine, SemgrepEngine,
    ShellcheckEngine, SqlStrictEngine, SqlfluffEngine,
};
use crate::llm::{default_backend, LlmBackend};
use crate::notebook::preprocess_notebooks;
use crate::sniff::{extract_embedded_snippets, guess_extensions};
use crate::text::{read_text, relpath, safe_snippet};
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tracing::{debug, info};

/// Synthesized temp file path -> (origin absolute path, origin start line).
pub type OriginMap = HashMap<PathBuf, (PathBuf, usize)>;

pub const DEFAULT_TOOLS: &[&str] = &[
    "semgrep",
    "detect-secrets",
    "sqlfluff",
    "shellcheck",
    "sql-strict",
];

pub struct ScanRequest {
    pub root: PathBuf,
    pub tools: Vec<String>,
    pub semgrep_config: String,
    pub files: Option<Vec<PathBuf>>,
    pub policy: ScanPolicy,
    /// Override for the semantic-review backend; `None` selects by
    /// environment when the llm-review tool is requested.
    pub backend: Option<Arc<dyn LlmBackend>>,
}

impl ScanRequest {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            tools: DEFAULT_TOOLS.iter().map(|t| t.to_string()).collect(),
            semgrep_config: "auto".to_string(),
            files: None,
            policy: ScanPolicy::default(),
            backend: None,
        }
    }

    pub fn with_tools(mut self, tools: Vec<String>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_semgrep_config(mut self, config: impl Into<String>) -> Self {
        self.semgrep_config = config.into();
        self
    }

    pub fn with_files(mut self, files: Vec<PathBuf>) -> Self {
        self.files = Some(files);
        self
    }

    pub fn with_policy(mut self, policy: ScanPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_backend(mut self, backend: Arc<dyn LlmBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    fn selected(&self, tool: &str) -> bool {
        self.tools.iter().any(|t| t == tool)
    }
}

/// Run the full two-stage pipeline. Only unrecoverable conditions (temp
/// directory creation) surface as errors; every engine failure is folded
/// into a diagnostic finding and the scan continues.
pub async fn run_scan(request: &ScanRequest) -> Result<Vec<Finding>> {
    let root = absolutize(&request.root, None);
    let policy = &request.policy;

    // Explicit list > single-file root > directory walk.
    let root_dir = containing_dir(&root);
    let files: Option<Vec<PathBuf>> = match &request.files {
        Some(list) => Some(
            list.iter()
                .map(|f| absolutize(f, Some(&root_dir)))
                .collect(),
        ),
        None if root.is_file() => Some(vec![root.clone()]),
        None => None,
    };

    // One scoped temp directory holds every synthesized file for the whole
    // invocation; it is removed on all exit paths when this guard drops.
    let tmp = TempDir::new().context("failed to create temporary directory for scan")?;

    let mut all_real_files: Vec<PathBuf> = Vec::new();
    let discover_list: Vec<PathBuf> = if files.is_none() && root.is_dir() {
        all_real_files = walk_files(&root, policy);
        all_real_files
            .iter()
            .filter(|p| has_extension(p, &["ipynb", "py"]))
            .cloned()
            .collect()
    } else {
        files
            .as_deref()
            .unwrap_or_default()
            .iter()
            .filter(|p| has_extension(p, &["ipynb", "py"]))
            .cloned()
            .collect()
    };

    let mut generated = preprocess_notebooks(&discover_list, tmp.path());
    let mut origin_map: OriginMap = HashMap::new();

    // Embedded SQL/shell snippets from every real target, each recorded with
    // its exact origin start line.
    let real_targets: Vec<PathBuf> = files.clone().unwrap_or_else(|| all_real_files.clone());
    for path in &real_targets {
        let Ok(text) = read_text(path) else {
            continue;
        };
        let base = file_name(path);
        for snippet in extract_embedded_snippets(&text) {
            let out_path = tmp
                .path()
                .join(format!("{base}__embedded{:03}{}", generated.len(), snippet.ext));
            if std::fs::write(&out_path, &snippet.text).is_ok() {
                origin_map.insert(out_path.clone(), (path.clone(), snippet.start_line.max(1)));
                generated.push(out_path);
            }
        }
    }

    // Typed copies of extensionless files that sniff as a known language,
    // recorded at origin line 1.
    let mut typed_copies: Vec<PathBuf> = Vec::new();
    for path in &real_targets {
        if path.extension().is_some() {
            continue;
        }
        let Ok(text) = read_text(path) else {
            continue;
        };
        let exts = guess_extensions(&text, &file_name(path));
        let Some(ext) = exts.first() else {
            continue;
        };
        let out_path = tmp.path().join(format!("{}{ext}", file_name(path)));
        if std::fs::write(&out_path, &text).is_ok() {
            origin_map.insert(out_path.clone(), (path.clone(), 1));
            typed_copies.push(out_path);
        }
    }

    debug!(
        synthesized = generated.len() + typed_copies.len(),
        tracked = origin_map.len(),
        "working set prepared"
    );

    let combined: Option<Vec<PathBuf>> =
        if files.is_some() || !generated.is_empty() || !typed_copies.is_empty() {
            let mut list = files.clone().unwrap_or_else(|| all_real_files.clone());
            list.extend(generated.iter().cloned());
            list.extend(typed_copies.iter().cloned());
            Some(list)
        } else {
            None
        };

    // STAGE 1: pattern/rule engines in a fixed order.
    let mut oss_findings: Vec<Finding> = Vec::new();
    let ctx = EngineContext {
        root: &root,
        files: combined.as_deref(),
        policy,
    };

    if request.selected("semgrep") {
        let engine = SemgrepEngine::new(request.semgrep_config.as_str());
        run_stage1(&engine, &ctx, &mut oss_findings);
    }
    if request.selected("detect-secrets") {
        run_stage1(&DetectSecretsEngine::new(), &ctx, &mut oss_findings);
    }
    if request.selected("sqlfluff") {
        run_stage1(&SqlfluffEngine::new(), &ctx, &mut oss_findings);
    }
    if request.selected("shellcheck") {
        run_stage1(&ShellcheckEngine::new(), &ctx, &mut oss_findings);
    }
    if request.selected("sql-strict") {
        // Runs against the real tree regardless of the synthesized working
        // set, then against generated .sql snippets living outside the root.
        let engine = SqlStrictEngine::new();
        let root_ctx = EngineContext {
            root: &root,
            files: None,
            policy,
        };
        run_stage1(&engine, &root_ctx, &mut oss_findings);

        let generated_sql: Vec<PathBuf> = generated
            .iter()
            .filter(|p| has_extension(p, &["sql"]))
            .cloned()
            .collect();
        if !generated_sql.is_empty() {
            let gen_ctx = EngineContext {
                root: &root,
                files: Some(&generated_sql),
                policy,
            };
            run_stage1(&engine, &gen_ctx, &mut oss_findings);
        }
    }

    // STAGE 2: semantic review, conditioned on stage-1 results.
    let mut llm_findings: Vec<Finding> = Vec::new();
    if request.selected("llm-review") {
        let backend = request.backend.clone().unwrap_or_else(default_backend);
        info!(backend = backend.name(), "running semantic review");
        let engine = LlmReviewEngine::new(backend);
        llm_findings = engine
            .run(&root, combined.as_deref(), policy, &oss_findings)
            .await;
    }

    let mut all_findings = oss_findings;
    all_findings.extend(llm_findings);

    remap_findings(&mut all_findings, &origin_map, &root);

    // Engines reporting a single-file scan root as "." get the file's name.
    if root.is_file() {
        let basename = file_name(&root);
        for finding in &mut all_findings {
            if finding.path == "." {
                finding.path = basename.clone();
            }
        }
    }

    Ok(all_findings)
}

fn run_stage1(engine: &dyn EngineAdapter, ctx: &EngineContext<'_>, out: &mut Vec<Finding>) {
    debug!(engine = engine.id(), "running stage-1 engine");
    match engine.run(ctx) {
        Ok(findings) => out.extend(findings),
        Err(failure) => out.push(failure.into_diagnostic(ctx.root)),
    }
}

/// Rewrite findings produced on synthesized temp files back onto their
/// origin: root-relative path, line shifted by the origin start, snippet
/// re-read from the true origin file. Finding order is never altered.
fn remap_findings(findings: &mut [Finding], origin_map: &OriginMap, root: &Path) {
    if origin_map.is_empty() {
        return;
    }
    let root_dir = containing_dir(root);
    for finding in findings.iter_mut() {
        let reported = Path::new(&finding.path);
        let abs = if reported.is_absolute() {
            reported.to_path_buf()
        } else {
            root_dir.join(reported)
        };
        let Some((origin, start)) = origin_map.get(&abs) else {
            continue;
        };
        finding.path = relpath(origin, root);
        finding.position.line = start + finding.position.line - 1;
        if let Ok(text) = read_text(origin) {
            finding.snippet = Some(safe_snippet(&text, finding.position.line, 2));
        }
    }
}

fn absolutize(path: &Path, base: Option<&Path>) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    match base {
        Some(base) => base.join(path),
        None => std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf()),
    }
}

fn containing_dir(root: &Path) -> PathBuf {
    if root.is_dir() {
        root.to_path_buf()
    } else {
        root.parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| root.to_path_buf())
    }
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .is_some_and(|e| extensions.contains(&e.as_str()))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}
