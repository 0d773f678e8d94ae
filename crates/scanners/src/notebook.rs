//! Notebook preprocessing: turns notebook-format files and exported notebook
//! scripts into plain `.py`/`.sql` files the engines can scan.
//!
//! Cell extraction is best-effort. Malformed notebooks are skipped silently,
//! and generated files carry a header comment naming the source cell rather
//! than an exact origin line (the embedded-snippet path is the one that tracks
//! precise start lines).

use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

const EXPORT_MARKER: &str = "# Databricks notebook source";
const SQL_MAGIC_MARKER: &str = "# MAGIC %sql";

/// Extract Python and SQL from `.ipynb` notebooks and exported `.py` notebooks.
/// Returns the list of generated file paths under `out_dir`.
pub fn preprocess_notebooks(targets: &[PathBuf], out_dir: &Path) -> Vec<PathBuf> {
    let mut generated = Vec::new();
    for path in targets {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("ipynb") => generated.extend(process_ipynb(path, out_dir)),
            Some("py") => {
                let head = match read_head(path, 4096) {
                    Some(head) => head,
                    None => continue,
                };
                if head.contains(EXPORT_MARKER) || head.contains(SQL_MAGIC_MARKER) {
                    generated.extend(process_exported_py(path, out_dir));
                }
            }
            _ => {}
        }
    }
    generated
}

fn process_ipynb(src_path: &Path, out_dir: &Path) -> Vec<PathBuf> {
    let mut out = Vec::new();
    let Ok(raw) = fs::read_to_string(src_path) else {
        return out;
    };
    let Ok(nb) = serde_json::from_str::<Value>(&raw) else {
        debug!(path = %src_path.display(), "skipping unparsable notebook");
        return out;
    };
    let base = stem(src_path);
    let file_name = src_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let cells = nb.get("cells").and_then(Value::as_array);
    let Some(cells) = cells else {
        return out;
    };

    for (idx, cell) in cells.iter().enumerate() {
        if cell.get("cell_type").and_then(Value::as_str) != Some("code") {
            continue;
        }
        let lines = cell_source_lines(cell);
        let code = lines.join("");
        let stripped: Vec<String> = lines
            .iter()
            .map(|l| l.trim_end_matches('\n').to_string())
            .collect();
        let first_nonempty = stripped
            .iter()
            .find(|l| !l.trim().is_empty())
            .cloned()
            .unwrap_or_default();

        if first_nonempty.trim_start().starts_with("%sql")
            || first_nonempty.trim_start().starts_with("%%sql")
        {
            // SQL is everything after the magic line.
            let start = stripped
                .iter()
                .position(|l| *l == first_nonempty)
                .unwrap_or(0);
            let sql_text = stripped[start + 1..].join("\n").trim().to_string();
            if !sql_text.is_empty() {
                let out_path = out_dir.join(format!("{base}__cell{idx:03}.sql"));
                let content = format!("-- Extracted from {file_name} cell {idx}\n{sql_text}");
                if fs::write(&out_path, content).is_ok() {
                    out.push(out_path);
                }
            }
        } else if !code.trim().is_empty() {
            let out_path = out_dir.join(format!("{base}__cell{idx:03}.py"));
            let content = format!("# Extracted from {file_name} cell {idx}\n{code}");
            if fs::write(&out_path, content).is_ok() {
                out.push(out_path);
            }
        }
    }
    out
}

fn process_exported_py(src_path: &Path, out_dir: &Path) -> Vec<PathBuf> {
    let mut out = Vec::new();
    let Ok(text) = crate::text::read_text(src_path) else {
        return out;
    };
    let lines: Vec<&str> = text.lines().collect();
    let base = stem(src_path);
    let file_name = src_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut i = 0;
    let mut block_idx = 0;
    while i < lines.len() {
        if lines[i].trim_start().starts_with(SQL_MAGIC_MARKER) {
            // Collect subsequent # MAGIC lines until the next # COMMAND
            // separator or a different magic type.
            let mut sql_lines: Vec<String> = Vec::new();
            i += 1;
            while i < lines.len() {
                let cur = lines[i];
                let cur_strip = cur.trim_start();
                if cur_strip.starts_with("# COMMAND") {
                    break;
                }
                if cur_strip.starts_with("# MAGIC %") && !cur_strip.starts_with(SQL_MAGIC_MARKER) {
                    break;
                }
                if cur_strip.starts_with("# MAGIC") {
                    let cleaned = cur_strip
                        .strip_prefix("# MAGIC ")
                        .or_else(|| cur_strip.strip_prefix("# MAGIC"))
                        .unwrap_or(cur_strip);
                    sql_lines.push(cleaned.to_string());
                } else {
                    sql_lines.push(cur.to_string());
                }
                i += 1;
            }
            let sql_text = sql_lines.join("\n").trim().to_string();
            if !sql_text.is_empty() {
                let out_path = out_dir.join(format!("{base}__sqlblock{block_idx:03}.sql"));
                let content = format!("-- Extracted from {file_name}\n{sql_text}");
                if fs::write(&out_path, content).is_ok() {
                    out.push(out_path);
                    block_idx += 1;
                }
            }
            continue;
        }
        i += 1;
    }
    out
}

fn cell_source_lines(cell: &Value) -> Vec<String> {
    match cell.get("source") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        Some(Value::String(s)) => s
            .split_inclusive('\n')
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

fn read_head(path: &Path, limit: usize) -> Option<String> {
    let text = crate::text::read_text(path).ok()?;
    let mut end = limit.min(text.len());
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    Some(text[..end].to_string())
}

fn stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "notebook".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_notebook(dir: &Path, name: &str, cells: serde_json::Value) -> PathBuf {
        let nb = serde_json::json!({ "cells": cells, "nbformat": 4 });
        let path = dir.join(name);
        fs::write(&path, serde_json::to_string(&nb).unwrap()).unwrap();
        path
    }

    #[test]
    fn test_ipynb_sql_magic_cell() {
        let src = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let nb = write_notebook(
            src.path(),
            "etl.ipynb",
            serde_json::json!([
                {
                    "cell_type": "code",
                    "source": ["%%sql\n", "DROP TABLE events;\n", "SELECT 1;\n"]
                }
            ]),
        );

        let generated = preprocess_notebooks(&[nb], out.path());
        assert_eq!(generated.len(), 1);
        assert!(generated[0].file_name().unwrap().to_str().unwrap() == "etl__cell000.sql");
        let content = fs::read_to_string(&generated[0]).unwrap();
        assert!(content.contains("DROP TABLE events;"));
        assert!(!content.contains("%%sql"));
    }

    #[test]
    fn test_ipynb_python_cell_and_skipped_markdown() {
        let src = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let nb = write_notebook(
            src.path(),
            "job.ipynb",
            serde_json::json!([
                { "cell_type": "markdown", "source": ["# heading\n"] },
                { "cell_type": "code", "source": ["import os\n", "os.system('ls')\n"] }
            ]),
        );

        let generated = preprocess_notebooks(&[nb], out.path());
        assert_eq!(generated.len(), 1);
        assert!(generated[0].file_name().unwrap().to_str().unwrap() == "job__cell001.py");
        let content = fs::read_to_string(&generated[0]).unwrap();
        assert!(content.contains("os.system('ls')"));
    }

    #[test]
    fn test_malformed_notebook_skipped_silently() {
        let src = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let path = src.path().join("broken.ipynb");
        fs::write(&path, "{ not json").unwrap();

        let generated = preprocess_notebooks(&[path], out.path());
        assert!(generated.is_empty());
    }

    #[test]
    fn test_exported_py_sql_blocks() {
        let src = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let path = src.path().join("pipeline.py");
        let text = concat!(
            "# Databricks notebook source\n",
            "print('setup')\n",
            "# COMMAND ----------\n",
            "# MAGIC %sql\n",
            "# MAGIC GRANT ALL ON db.* TO 'svc';\n",
            "# MAGIC SELECT 1;\n",
            "# COMMAND ----------\n",
            "# MAGIC %sql\n",
            "# MAGIC DELETE FROM t;\n",
        );
        fs::write(&path, text).unwrap();

        let generated = preprocess_notebooks(&[path], out.path());
        assert_eq!(generated.len(), 2);
        let first = fs::read_to_string(&generated[0]).unwrap();
        assert!(first.contains("GRANT ALL ON db.* TO 'svc';"));
        assert!(first.contains("SELECT 1;"));
        let second = fs::read_to_string(&generated[1]).unwrap();
        assert!(second.contains("DELETE FROM t;"));
    }

    #[test]
    fn test_plain_py_without_markers_ignored() {
        let src = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let path = src.path().join("app.py");
        fs::write(&path, "import os\nprint('hello')\n").unwrap();

        let generated = preprocess_notebooks(&[path], out.path());
        assert!(generated.is_empty());
    }
}
