//! Dragnet Scanners - Multi-Engine Finding Pipeline
//!
//! This crate aggregates independent static-analysis engines over one code
//! tree: source discovery and snippet extraction across mixed file types,
//! per-engine adapters normalizing heterogeneous outputs into one finding
//! model, a two-stage OSS+LLM review protocol, and the position remapping
//! that projects findings computed on synthesized temp files back onto their
//! origin files and lines.

pub mod core;
pub mod engines;
pub mod llm;
pub mod notebook;
pub mod pipeline;
pub mod report;
pub mod sniff;
pub mod text;

pub use crate::core::{Finding, Position, ScanPolicy, Severity};

pub use engines::{
    DetectSecretsEngine, EngineAdapter, EngineContext, EngineFailure, LlmReviewEngine,
    SemgrepEngine, ShellcheckEngine, SqlStrictEngine, SqlfluffEngine,
};

pub use llm::{default_backend, LlmBackend, MockBackend, OllamaBackend, ServingBackend};

pub use pipeline::{run_scan, OriginMap, ScanRequest, DEFAULT_TOOLS};

pub use report::{
    exceeds_threshold, render, summarize, to_json, to_markdown, to_sarif, worst_severity,
    ReportFormat, SummaryCounts,
};

pub use sniff::{extract_embedded_snippets, guess_extensions, EmbeddedSnippet};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
