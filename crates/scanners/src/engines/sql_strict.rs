//! Strict raw-SQL checks. Runs in-process against `.sql` text, no external
//! binary: broad grants, unguarded destructive drops, and DELETE statements
//! with no WHERE clause.

use crate::core::{Finding, Position, Severity};
use crate::engines::{
    filter_by_extension, walk_files, EngineAdapter, EngineContext, EngineFailure,
};
use crate::text::{line_from_index, read_text, relpath, safe_snippet};
use regex::Regex;
use std::path::PathBuf;
use std::sync::LazyLock;

const TOOL: &str = "sql-strict";

static GRANT_ALL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bGRANT\s+ALL\b").expect("grant all pattern"));

static DROP_TABLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bDROP\s+TABLE\b(\s+IF\s+EXISTS\s+temp)?").expect("drop table pattern"));

static DELETE_STMT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)\bDELETE\s+FROM\s+[A-Za-z0-9_."]+.*?;"#).expect("delete pattern")
});

static WHERE_CLAUSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bWHERE\b").expect("where pattern"));

pub struct SqlStrictEngine;

impl SqlStrictEngine {
    pub fn new() -> Self {
        Self
    }

    /// Check one SQL text. Public so the checks stay exercisable without
    /// touching the filesystem.
    pub fn check_text(&self, text: &str, display_path: &str) -> Vec<Finding> {
        let mut findings = Vec::new();

        for m in GRANT_ALL.find_iter(text) {
            let line = line_from_index(text, m.start());
            findings.push(
                Finding::new(
                    "SQL_STRICT_GRANT_ALL",
                    Severity::High,
                    "Broad GRANT ALL detected.",
                    display_path,
                    Position::new(line, 1),
                )
                .with_snippet(Some(safe_snippet(text, line, 2)))
                .with_recommendation("Use least-privilege GRANTs on specific objects.")
                .with_engine(TOOL),
            );
        }

        for caps in DROP_TABLE.captures_iter(text) {
            // Temp-scoped, exists-guarded drops are allowed.
            if caps.get(1).is_some() {
                continue;
            }
            let m = caps.get(0).expect("whole match");
            let line = line_from_index(text, m.start());
            findings.push(
                Finding::new(
                    "SQL_STRICT_DROP_TABLE",
                    Severity::Medium,
                    "Potential destructive DROP TABLE.",
                    display_path,
                    Position::new(line, 1),
                )
                .with_snippet(Some(safe_snippet(text, line, 2)))
                .with_recommendation(
                    "Avoid DROP outside migrations/tests or guard with IF EXISTS and temp scope.",
                )
                .with_engine(TOOL),
            );
        }

        for m in DELETE_STMT.find_iter(text) {
            // The WHERE must appear within the statement's own text, up to
            // its terminating semicolon.
            if WHERE_CLAUSE.is_match(m.as_str()) {
                continue;
            }
            let line = line_from_index(text, m.start());
            findings.push(
                Finding::new(
                    "SQL_STRICT_DELETE_ALL",
                    Severity::High,
                    "DELETE statement without WHERE clause.",
                    display_path,
                    Position::new(line, 1),
                )
                .with_snippet(Some(safe_snippet(text, line, 2)))
                .with_recommendation("Add a WHERE clause or guard with partition predicates.")
                .with_engine(TOOL),
            );
        }

        findings
    }
}

impl Default for SqlStrictEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineAdapter for SqlStrictEngine {
    fn id(&self) -> &'static str {
        TOOL
    }

    fn run(&self, ctx: &EngineContext<'_>) -> Result<Vec<Finding>, EngineFailure> {
        let targets: Vec<PathBuf> = match ctx.files {
            Some(files) => filter_by_extension(ctx.root, files, &[".sql"]),
            None => walk_files(ctx.root, ctx.policy)
                .into_iter()
                .filter(|p| p.to_string_lossy().to_ascii_lowercase().ends_with(".sql"))
                .collect(),
        };

        let mut findings = Vec::new();
        for path in targets {
            let Ok(text) = read_text(&path) else {
                continue;
            };
            findings.extend(self.check_text(&text, &relpath(&path, ctx.root)));
        }
        Ok(findings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ScanPolicy;
    use std::path::Path;

    #[test]
    fn test_grant_all_and_delete_without_where() {
        let sql = "GRANT ALL ON *.* TO 'x';\nDELETE FROM users;\n";
        let findings = SqlStrictEngine::new().check_text(sql, "perm.sql");

        assert_eq!(findings.len(), 2);
        assert_eq!(findings[0].rule_id, "SQL_STRICT_GRANT_ALL");
        assert_eq!(findings[0].severity, Severity::High);
        assert_eq!(findings[0].position.line, 1);
        assert!(findings[0]
            .snippet
            .as_ref()
            .unwrap()
            .contains("--> "));
        assert!(findings[0].snippet.as_ref().unwrap().contains("GRANT ALL"));

        assert_eq!(findings[1].rule_id, "SQL_STRICT_DELETE_ALL");
        assert_eq!(findings[1].severity, Severity::High);
        assert_eq!(findings[1].position.line, 2);
        assert!(findings[1]
            .snippet
            .as_ref()
            .unwrap()
            .contains("DELETE FROM users;"));
    }

    #[test]
    fn test_delete_with_where_is_allowed() {
        let sql = "DELETE FROM users WHERE id = 42;\n";
        let findings = SqlStrictEngine::new().check_text(sql, "ok.sql");
        assert!(findings.is_empty());
    }

    #[test]
    fn test_where_in_later_statement_does_not_excuse() {
        let sql = "DELETE FROM audit_log;\nSELECT * FROM t WHERE id = 1;\n";
        let findings = SqlStrictEngine::new().check_text(sql, "mixed.sql");
        assert!(findings
            .iter()
            .any(|f| f.rule_id == "SQL_STRICT_DELETE_ALL" && f.position.line == 1));
    }

    #[test]
    fn test_drop_table_guards() {
        let findings = SqlStrictEngine::new().check_text("DROP TABLE events;", "a.sql");
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].rule_id, "SQL_STRICT_DROP_TABLE");
        assert_eq!(findings[0].severity, Severity::Medium);

        let guarded = SqlStrictEngine::new().check_text("DROP TABLE IF EXISTS temp_results;", "b.sql");
        assert!(guarded.is_empty());
    }

    #[test]
    fn test_idempotent_over_same_text() {
        let sql = "GRANT ALL ON db.* TO 'svc';\nDROP TABLE t;\nDELETE FROM t;\n";
        let engine = SqlStrictEngine::new();
        let first = engine.check_text(sql, "x.sql");
        let second = engine.check_text(sql, "x.sql");
        assert_eq!(first, second);
        assert_eq!(first.len(), 3);
    }

    #[test]
    fn test_run_walks_only_sql_files() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("bad.sql"), "DELETE FROM t;\n").unwrap();
        std::fs::write(dir.path().join("note.txt"), "DELETE FROM t;\n").unwrap();

        let policy = ScanPolicy::default();
        let ctx = EngineContext {
            root: dir.path(),
            files: None,
            policy: &policy,
        };
        let findings = SqlStrictEngine::new().run(&ctx).unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].path, "bad.sql");
    }

    #[test]
    fn test_explicit_list_with_absolute_paths() {
        let dir = tempfile::TempDir::new().unwrap();
        let sql_path = dir.path().join("gen.sql");
        std::fs::write(&sql_path, "GRANT ALL ON x TO y;\n").unwrap();

        let policy = ScanPolicy::default();
        let files = vec![sql_path.clone()];
        let root = Path::new("/somewhere/else");
        let ctx = EngineContext {
            root,
            files: Some(&files),
            policy: &policy,
        };
        let findings = SqlStrictEngine::new().run(&ctx).unwrap();
        assert_eq!(findings.len(), 1);
        // Outside the root the absolute path is kept, so the remap pass can
        // match it against the origin map.
        assert_eq!(findings[0].path, sql_path.to_string_lossy());
    }
}
