use crate::core::Severity;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Self {
            line: line.max(1),
            column: column.max(1),
        }
    }
}

impl Default for Position {
    fn default() -> Self {
        Self { line: 1, column: 1 }
    }
}

/// One normalized detected issue, shared across every engine adapter.
///
/// Created by an adapter right after parsing its engine's native output,
/// rewritten at most once by the origin-remapping pass, immutable after that.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub rule_id: String,
    pub severity: Severity,
    pub message: String,
    pub path: String,
    pub position: Position,
    pub snippet: Option<String>,
    pub recommendation: Option<String>,
    pub meta: Option<BTreeMap<String, String>>,
}

impl Finding {
    pub fn new(
        rule_id: impl Into<String>,
        severity: Severity,
        message: impl Into<String>,
        path: impl Into<String>,
        position: Position,
    ) -> Self {
        Self {
            rule_id: rule_id.into(),
            severity,
            message: message.into(),
            path: path.into(),
            position,
            snippet: None,
            recommendation: None,
            meta: None,
        }
    }

    pub fn with_snippet(mut self, snippet: Option<String>) -> Self {
        self.snippet = snippet;
        self
    }

    pub fn with_recommendation(mut self, recommendation: impl Into<String>) -> Self {
        self.recommendation = Some(recommendation.into());
        self
    }

    pub fn with_engine(mut self, engine: &str) -> Self {
        self.meta
            .get_or_insert_with(BTreeMap::new)
            .insert("engine".to_string(), engine.to_string());
        self
    }

    pub fn with_meta(mut self, key: &str, value: impl Into<String>) -> Self {
        self.meta
            .get_or_insert_with(BTreeMap::new)
            .insert(key.to_string(), value.into());
        self
    }

    /// Diagnostic findings report engine/environment failures, not code issues.
    /// They live in a reserved rule-id namespace and never exceed low severity.
    pub fn is_diagnostic(&self) -> bool {
        self.rule_id.starts_with("OSS_ENGINE_") || self.rule_id.starts_with("LLM_ENGINE_")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_sets_meta_engine() {
        let f = Finding::new(
            "SEMGREP:rule",
            Severity::High,
            "msg",
            "a.py",
            Position::new(3, 1),
        )
        .with_engine("semgrep");
        assert_eq!(f.meta.unwrap().get("engine").unwrap(), "semgrep");
    }

    #[test]
    fn test_position_clamps_to_one() {
        let p = Position::new(0, 0);
        assert_eq!((p.line, p.column), (1, 1));
    }

    #[test]
    fn test_serde_roundtrip_preserves_all_fields() {
        let f = Finding::new(
            "SQL_STRICT_GRANT_ALL",
            Severity::High,
            "Broad GRANT ALL detected.",
            "db/init.sql",
            Position::new(4, 1),
        )
        .with_snippet(Some("-->     4: GRANT ALL".to_string()))
        .with_recommendation("Use least-privilege GRANTs.")
        .with_engine("sql-strict");

        let json = serde_json::to_string(&f).unwrap();
        let back: Finding = serde_json::from_str(&json).unwrap();
        assert_eq!(back, f);
    }

    #[test]
    fn test_diagnostic_namespace() {
        let f = Finding::new(
            "OSS_ENGINE_MISSING_SEMGREP",
            Severity::Low,
            "missing",
            ".",
            Position::default(),
        );
        assert!(f.is_diagnostic());
        let g = Finding::new(
            "SEMGREP:x",
            Severity::Low,
            "finding",
            ".",
            Position::default(),
        );
        assert!(!g.is_diagnostic());
    }
}
