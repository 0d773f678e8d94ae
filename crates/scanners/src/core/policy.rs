use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Scan-wide configuration threaded explicitly into every adapter call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanPolicy {
    #[serde(default = "default_exclude_dirs")]
    pub exclude_dirs: Vec<String>,

    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,

    #[serde(default = "default_subprocess_timeout_secs")]
    pub subprocess_timeout_secs: u64,

    #[serde(default = "default_per_file_timeout_secs")]
    pub per_file_timeout_secs: u64,

    #[serde(default)]
    pub llm: LlmSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSettings {
    /// Files larger than this are skipped by the semantic-review engine.
    #[serde(default = "default_llm_max_file_bytes")]
    pub max_file_bytes: u64,

    #[serde(default = "default_llm_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_llm_temperature")]
    pub temperature: f32,
}

fn default_exclude_dirs() -> Vec<String> {
    [
        ".git",
        ".venv",
        "__pycache__",
        ".idea",
        ".eggs",
        "dist",
        "build",
        "node_modules",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_max_file_bytes() -> u64 {
    2_000_000
}

fn default_subprocess_timeout_secs() -> u64 {
    300
}

fn default_per_file_timeout_secs() -> u64 {
    120
}

fn default_llm_max_file_bytes() -> u64 {
    10_000
}

fn default_llm_max_tokens() -> u32 {
    2000
}

fn default_llm_temperature() -> f32 {
    0.1
}

impl Default for ScanPolicy {
    fn default() -> Self {
        Self {
            exclude_dirs: default_exclude_dirs(),
            max_file_bytes: default_max_file_bytes(),
            subprocess_timeout_secs: default_subprocess_timeout_secs(),
            per_file_timeout_secs: default_per_file_timeout_secs(),
            llm: LlmSettings::default(),
        }
    }
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            max_file_bytes: default_llm_max_file_bytes(),
            max_tokens: default_llm_max_tokens(),
            temperature: default_llm_temperature(),
        }
    }
}

impl ScanPolicy {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let policy: Self = serde_yaml::from_str(&content)?;
        Ok(policy)
    }

    pub fn is_excluded_dir(&self, name: &str) -> bool {
        self.exclude_dirs.iter().any(|d| d == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let policy = ScanPolicy::default();
        assert!(policy.is_excluded_dir(".git"));
        assert!(policy.is_excluded_dir("node_modules"));
        assert!(!policy.is_excluded_dir("src"));
        assert_eq!(policy.llm.max_file_bytes, 10_000);
        assert_eq!(policy.subprocess_timeout_secs, 300);
    }

    #[test]
    fn test_yaml_partial_override() {
        let yaml = "exclude_dirs: [target]\nllm:\n  max_file_bytes: 512\n";
        let policy: ScanPolicy = serde_yaml::from_str(yaml).unwrap();
        assert!(policy.is_excluded_dir("target"));
        assert!(!policy.is_excluded_dir(".git"));
        assert_eq!(policy.llm.max_file_bytes, 512);
        // Unspecified fields keep their defaults.
        assert_eq!(policy.max_file_bytes, 2_000_000);
    }
}
