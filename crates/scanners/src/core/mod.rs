//! Core abstractions shared by every engine adapter.
//!
//! The finding model normalizes heterogeneous tool outputs into one shape,
//! the severity enum gives all engines a single total order for threshold
//! decisions, and the scan policy carries exclusion/limit configuration as an
//! explicit parameter rather than ambient state.

pub mod finding;
pub mod policy;
pub mod severity;

pub use finding::{Finding, Position};
pub use policy::{LlmSettings, ScanPolicy};
pub use severity::Severity;

/// Seam for in-process rule engines: one rule inspects a file's path and
/// text under a policy and yields findings. The built-in rule packs plug in
/// here; the pipeline and renderer only ever see the resulting findings.
pub type RuleFn = fn(&std::path::Path, &str, &ScanPolicy) -> Vec<Finding>;
