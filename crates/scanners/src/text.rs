//! Small text and path helpers shared across adapters and the pipeline.

use std::path::Path;

/// Read a file as UTF-8, replacing invalid sequences instead of failing.
pub fn read_text(path: &Path) -> std::io::Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Path relative to `root`, falling back to the path itself when it lies
/// outside the root. Equal paths yield `"."` so single-file scans can be
/// normalized afterwards.
pub fn relpath(path: &Path, root: &Path) -> String {
    match path.strip_prefix(root) {
        Ok(rel) if rel.as_os_str().is_empty() => ".".to_string(),
        Ok(rel) => rel.to_string_lossy().into_owned(),
        Err(_) => path.to_string_lossy().into_owned(),
    }
}

/// 1-indexed line number of the byte offset `idx` within `text`.
pub fn line_from_index(text: &str, idx: usize) -> usize {
    text.as_bytes()[..idx.min(text.len())]
        .iter()
        .filter(|&&b| b == b'\n')
        .count()
        + 1
}

/// Numbered context window around `line` with the target line marked.
pub fn safe_snippet(text: &str, line: usize, context: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    if lines.is_empty() {
        return String::new();
    }
    let i = line.saturating_sub(1).min(lines.len() - 1);
    let start = i.saturating_sub(context);
    let end = (i + context + 1).min(lines.len());
    let mut out = Vec::with_capacity(end - start);
    for idx in start..end {
        let prefix = if idx == i { "-->" } else { "   " };
        out.push(format!("{} {:5}: {}", prefix, idx + 1, lines[idx]));
    }
    out.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_relpath_inside_and_outside_root() {
        let root = PathBuf::from("/work/repo");
        assert_eq!(relpath(Path::new("/work/repo/src/a.sql"), &root), "src/a.sql");
        assert_eq!(relpath(Path::new("/tmp/xyz/a.sql"), &root), "/tmp/xyz/a.sql");
        assert_eq!(relpath(Path::new("/work/repo"), &root), ".");
    }

    #[test]
    fn test_line_from_index() {
        let text = "one\ntwo\nthree";
        assert_eq!(line_from_index(text, 0), 1);
        assert_eq!(line_from_index(text, 4), 2);
        assert_eq!(line_from_index(text, text.len()), 3);
    }

    #[test]
    fn test_safe_snippet_marks_target_line() {
        let text = "a\nb\nc\nd\ne";
        let snippet = safe_snippet(text, 3, 2);
        let lines: Vec<&str> = snippet.lines().collect();
        assert_eq!(lines.len(), 5);
        assert!(lines[2].starts_with("--> "));
        assert!(lines[2].contains("3: c"));
        assert!(lines[0].starts_with("    "));
    }

    #[test]
    fn test_safe_snippet_clamps_out_of_range_line() {
        let text = "only";
        let snippet = safe_snippet(text, 99, 2);
        assert!(snippet.contains("only"));
        assert!(snippet.starts_with("-->"));
        assert_eq!(safe_snippet("", 1, 2), "");
    }
}
