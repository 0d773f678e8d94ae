//! Content sniffing: extension guessing for untyped files and extraction of
//! embedded SQL/shell snippets from arbitrary host text.
//!
//! Extraction records the 1-indexed line where each snippet begins in the
//! original text; the pipeline depends on that to remap findings produced on
//! synthesized snippet files back onto their origin.

use regex::Regex;
use std::sync::LazyLock;

static SQL_HINT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(SELECT|INSERT\s+INTO|UPDATE\s+\w+\s+SET|DELETE\s+FROM|GRANT\s+ALL|DROP\s+TABLE|TRUNCATE\s+TABLE)\b",
    )
    .expect("sql hint pattern")
});

static SHELL_HINT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)(^#!.*\b(bash|sh)\b)|\b(curl\s+|wget\s+|rm\s+-rf\s+|chmod\s+\d{3}|sudo\s+)")
        .expect("shell hint pattern")
});

static PY_HINT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(def|import|from\s+\w+\s+import)\b").expect("py hint"));

static JS_HINT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\bfunction\s+\w+|\bimport\s+.*from\s+['"]"#).expect("js hint")
});

static JAVA_HINT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bpackage\s+\w+;|public\s+class\b").expect("java hint"));

static GO_HINT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bpackage\s+\w+\n|func\s+\w+\(|import\s+\(").expect("go hint"));

static FENCED_SQL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)```(sql|postgres|tsql|bigquery)\s*(.*?)```").expect("fenced sql")
});

static FENCED_SHELL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)```(bash|sh|shell)\s*(.*?)```").expect("fenced shell"));

static JAVA_RUNTIME_EXEC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"Runtime\.getRuntime\(\)\.exec\(\s*"([^"]+)"\s*\)"#).expect("runtime exec")
});

static JAVA_PROCESS_BUILDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"ProcessBuilder\(\s*"bash"\s*,\s*"-c"\s*,\s*"([^"]+)"\s*\)"#)
        .expect("process builder")
});

static JDBC_EXECUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\.(execute|executeQuery|prepareStatement)\(\s*"([^"]+)"\s*\)"#)
        .expect("jdbc execute")
});

static JS_CHILD_PROCESS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"child_process\.(exec|execSync)\(\s*['"]([^'"]+)['"]\s*\)"#).expect("child process")
});

static JS_SPAWN_SHELL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"spawn\(\s*['"](bash|sh)['"]\s*,\s*\[\s*['"]-c['"]\s*,\s*['"]([^'"]+)['"]\s*\]"#)
        .expect("spawn shell")
});

static DB_QUERY_CALL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\.(query|execute)\(\s*['"]([^'"]+)['"]\s*\)"#).expect("db query")
});

const KNOWN_EXTENSIONS: &[&str] = &[
    ".py", ".sh", ".bash", ".sql", ".js", ".ts", ".java", ".go", ".rb", ".php", ".cs",
];

/// A snippet pulled out of host text, typed by target extension and tagged
/// with the 1-indexed line where it begins in the original text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedSnippet {
    pub ext: &'static str,
    pub text: String,
    pub start_line: usize,
}

/// Guess likely extensions for a file from its name and content.
///
/// Precedence is fixed and first-match-wins: a known filename extension is
/// returned verbatim before any content heuristic runs. An empty result means
/// the file stays untyped and is excluded from type-sensitive engines.
pub fn guess_extensions(text: &str, filename: &str) -> Vec<String> {
    let name = filename.to_ascii_lowercase();
    if let Some(dot) = name.rfind('.') {
        let ext = &name[dot..];
        if KNOWN_EXTENSIONS.contains(&ext) {
            return vec![ext.to_string()];
        }
    }
    if text.starts_with("#!/") {
        let first = text.lines().next().unwrap_or("");
        if first.contains("bash") || first.ends_with("/sh") {
            return vec![".sh".to_string()];
        }
    }
    if PY_HINT.is_match(text) {
        return vec![".py".to_string()];
    }
    if JS_HINT.is_match(text) {
        return vec![".js".to_string()];
    }
    if JAVA_HINT.is_match(text) {
        return vec![".java".to_string()];
    }
    if GO_HINT.is_match(text) {
        return vec![".go".to_string()];
    }
    if SQL_HINT.is_match(text) {
        return vec![".sql".to_string()];
    }
    if SHELL_HINT.is_match(text) {
        return vec![".sh".to_string()];
    }
    Vec::new()
}

/// Extract embedded SQL and shell snippets from a text blob.
///
/// Every extractor runs independently over the full text and the results are
/// unioned, so one input can yield multiple snippets of different kinds.
/// Extraction never fails; a heuristic that finds nothing contributes nothing.
pub fn extract_embedded_snippets(text: &str) -> Vec<EmbeddedSnippet> {
    let mut out = Vec::new();

    // Fenced code blocks. The recorded line is the opening fence itself.
    for caps in FENCED_SQL.captures_iter(text) {
        push_snippet(&mut out, text, ".sql", caps.get(2), caps.get(0));
    }
    for caps in FENCED_SHELL.captures_iter(text) {
        push_snippet(&mut out, text, ".sh", caps.get(2), caps.get(0));
    }

    // Inline SQL statements: bounded by the next semicolon, or the first line
    // when none appears within 1000 bytes.
    for m in SQL_HINT.find_iter(text) {
        let rest = &text[m.start()..];
        let snippet = match rest.find(';') {
            Some(p) if p < 1000 => &rest[..p + 1],
            _ => rest.lines().next().unwrap_or(""),
        };
        let trimmed = snippet.trim();
        if !trimmed.is_empty() {
            out.push(EmbeddedSnippet {
                ext: ".sql",
                text: trimmed.to_string(),
                start_line: crate::text::line_from_index(text, m.start()),
            });
        }
    }

    // Shell command markers: the single containing line.
    for m in SHELL_HINT.find_iter(text) {
        let line_start = text[..m.start()].rfind('\n').map(|i| i + 1).unwrap_or(0);
        let line_end = text[m.start()..]
            .find('\n')
            .map(|i| m.start() + i)
            .unwrap_or(text.len());
        let line = text[line_start..line_end].trim();
        if !line.is_empty() {
            out.push(EmbeddedSnippet {
                ext: ".sh",
                text: line.to_string(),
                start_line: crate::text::line_from_index(text, m.start()),
            });
        }
    }

    // Host-language call patterns carrying command strings.
    for caps in JAVA_RUNTIME_EXEC.captures_iter(text) {
        push_snippet(&mut out, text, ".sh", caps.get(1), caps.get(0));
    }
    for caps in JAVA_PROCESS_BUILDER.captures_iter(text) {
        push_snippet(&mut out, text, ".sh", caps.get(1), caps.get(0));
    }
    for caps in JDBC_EXECUTE.captures_iter(text) {
        if let Some(sql) = caps.get(2) {
            if SQL_HINT.is_match(sql.as_str()) {
                push_snippet(&mut out, text, ".sql", Some(sql), caps.get(0));
            }
        }
    }
    for caps in JS_CHILD_PROCESS.captures_iter(text) {
        push_snippet(&mut out, text, ".sh", caps.get(2), caps.get(0));
    }
    for caps in JS_SPAWN_SHELL.captures_iter(text) {
        push_snippet(&mut out, text, ".sh", caps.get(2), caps.get(0));
    }
    for caps in DB_QUERY_CALL.captures_iter(text) {
        if let Some(sql) = caps.get(2) {
            if SQL_HINT.is_match(sql.as_str()) {
                push_snippet(&mut out, text, ".sql", Some(sql), caps.get(0));
            }
        }
    }

    out
}

fn push_snippet(
    out: &mut Vec<EmbeddedSnippet>,
    text: &str,
    ext: &'static str,
    content: Option<regex::Match<'_>>,
    whole: Option<regex::Match<'_>>,
) {
    let (Some(content), Some(whole)) = (content, whole) else {
        return;
    };
    let trimmed = content.as_str().trim();
    if trimmed.is_empty() {
        return;
    }
    out.push(EmbeddedSnippet {
        ext,
        text: trimmed.to_string(),
        start_line: crate::text::line_from_index(text, whole.start()),
    });
}
