//! Report rendering: one ordered finding sequence, three encodings.
//!
//! Order is preserved exactly as the pipeline produced it in all three
//! formats; nothing here sorts by severity.

use crate::core::{Finding, Severity};
use anyhow::Result;
use serde_json::json;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Markdown,
    Json,
    Sarif,
}

impl ReportFormat {
    pub fn file_extension(&self) -> &'static str {
        match self {
            Self::Markdown => ".md",
            Self::Json => ".json",
            Self::Sarif => ".sarif",
        }
    }
}

pub fn render(findings: &[Finding], format: ReportFormat) -> Result<String> {
    match format {
        ReportFormat::Markdown => Ok(to_markdown(findings)),
        ReportFormat::Json => to_json(findings),
        ReportFormat::Sarif => to_sarif(findings),
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct SummaryCounts {
    pub total: usize,
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

pub fn summarize(findings: &[Finding]) -> SummaryCounts {
    let mut counts = SummaryCounts::default();
    for finding in findings {
        counts.total += 1;
        match finding.severity {
            Severity::Critical => counts.critical += 1,
            Severity::High => counts.high += 1,
            Severity::Medium => counts.medium += 1,
            Severity::Low => counts.low += 1,
        }
    }
    counts
}

/// Highest severity present, `None` for an empty set.
pub fn worst_severity(findings: &[Finding]) -> Option<Severity> {
    findings.iter().map(|f| f.severity).max()
}

/// Exit-code policy: does the worst finding reach the configured threshold?
pub fn exceeds_threshold(findings: &[Finding], threshold: Severity) -> bool {
    worst_severity(findings).is_some_and(|worst| worst.rank() >= threshold.rank())
}

pub fn to_markdown(findings: &[Finding]) -> String {
    if findings.is_empty() {
        return "✅ No issues found.".to_string();
    }
    let counts = summarize(findings);
    let mut lines = vec!["# Dragnet Report".to_string(), String::new()];

    let mut summary_parts = vec![format!("Total: {}", counts.total)];
    for (label, count) in [
        ("Critical", counts.critical),
        ("High", counts.high),
        ("Medium", counts.medium),
        ("Low", counts.low),
    ] {
        if count > 0 {
            summary_parts.push(format!("{label}: {count}"));
        }
    }
    lines.push(format!("**Summary:** {}", summary_parts.join(", ")));
    lines.push(String::new());

    for (idx, f) in findings.iter().enumerate() {
        lines.push(format!(
            "## {}. [{}] {} — {}:{}",
            idx + 1,
            f.severity.to_string().to_uppercase(),
            f.rule_id,
            f.path,
            f.position.line
        ));
        lines.push(format!("{}\n", f.message));
        if let Some(snippet) = &f.snippet {
            lines.push(format!("```\n{snippet}\n```"));
        }
        if let Some(recommendation) = &f.recommendation {
            lines.push(format!("**Fix:** {recommendation}"));
        }
        lines.push(String::new());
    }
    lines.join("\n")
}

pub fn to_json(findings: &[Finding]) -> Result<String> {
    Ok(serde_json::to_string_pretty(findings)?)
}

pub fn to_sarif(findings: &[Finding]) -> Result<String> {
    // Rules dictionary keyed by first-seen rule_id.
    let mut rules: BTreeMap<String, serde_json::Value> = BTreeMap::new();
    let mut rule_order: Vec<String> = Vec::new();
    let mut results = Vec::with_capacity(findings.len());

    for f in findings {
        if !rules.contains_key(&f.rule_id) {
            rules.insert(
                f.rule_id.clone(),
                json!({
                    "id": f.rule_id,
                    "shortDescription": { "text": truncate(&f.message, 80) },
                }),
            );
            rule_order.push(f.rule_id.clone());
        }
        results.push(json!({
            "ruleId": f.rule_id,
            "level": f.severity.sarif_level(),
            "message": { "text": f.message },
            "locations": [
                {
                    "physicalLocation": {
                        "artifactLocation": { "uri": f.path },
                        "region": { "startLine": f.position.line },
                    }
                }
            ],
        }));
    }

    let ordered_rules: Vec<&serde_json::Value> =
        rule_order.iter().filter_map(|id| rules.get(id)).collect();

    let sarif = json!({
        "$schema": "https://json.schemastore.org/sarif-2.1.0.json",
        "version": "2.1.0",
        "runs": [
            {
                "tool": { "driver": { "name": "Dragnet", "rules": ordered_rules } },
                "results": results,
            }
        ],
    });
    Ok(serde_json::to_string_pretty(&sarif)?)
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let mut end = max_len;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Position;

    fn sample() -> Vec<Finding> {
        vec![
            Finding::new(
                "SQL_STRICT_GRANT_ALL",
                Severity::High,
                "Broad GRANT ALL detected.",
                "db/perm.sql",
                Position::new(4, 1),
            )
            .with_snippet(Some("-->     4: GRANT ALL".to_string()))
            .with_recommendation("Use least-privilege GRANTs on specific objects."),
            Finding::new(
                "SHELLCHECK:SC2086",
                Severity::Medium,
                "Double quote to prevent globbing.",
                "run.sh",
                Position::new(2, 1),
            ),
            Finding::new(
                "SQL_STRICT_GRANT_ALL",
                Severity::High,
                "Broad GRANT ALL detected.",
                "db/other.sql",
                Position::new(9, 1),
            ),
        ]
    }

    #[test]
    fn test_markdown_empty_sentinel() {
        assert_eq!(to_markdown(&[]), "✅ No issues found.");
    }

    #[test]
    fn test_markdown_structure() {
        let md = to_markdown(&sample());
        assert!(md.contains("**Summary:** Total: 3, High: 2, Medium: 1"));
        assert!(md.contains("## 1. [HIGH] SQL_STRICT_GRANT_ALL — db/perm.sql:4"));
        assert!(md.contains("```\n-->     4: GRANT ALL\n```"));
        assert!(md.contains("**Fix:** Use least-privilege GRANTs"));
        // Order preserved: shellcheck finding comes second.
        let first = md.find("SQL_STRICT_GRANT_ALL").unwrap();
        let second = md.find("SHELLCHECK:SC2086").unwrap();
        assert!(first < second);
    }

    #[test]
    fn test_json_roundtrip_preserves_order_and_fields() {
        let findings = sample();
        let raw = to_json(&findings).unwrap();
        let back: Vec<Finding> = serde_json::from_str(&raw).unwrap();
        assert_eq!(back, findings);
    }

    #[test]
    fn test_sarif_rules_and_levels() {
        let raw = to_sarif(&sample()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();

        let rules = value["runs"][0]["tool"]["driver"]["rules"].as_array().unwrap();
        // Duplicate rule_ids collapse to the first-seen entry.
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0]["id"], "SQL_STRICT_GRANT_ALL");

        let results = value["runs"][0]["results"].as_array().unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0]["level"], "error");
        assert_eq!(results[1]["level"], "warning");
        assert_eq!(
            results[0]["locations"][0]["physicalLocation"]["region"]["startLine"],
            4
        );
        assert_eq!(
            results[0]["locations"][0]["physicalLocation"]["artifactLocation"]["uri"],
            "db/perm.sql"
        );
    }

    #[test]
    fn test_sarif_level_mapping_for_all_severities() {
        let findings: Vec<Finding> = [
            (Severity::Low, "note"),
            (Severity::Medium, "warning"),
            (Severity::High, "error"),
            (Severity::Critical, "error"),
        ]
        .iter()
        .enumerate()
        .map(|(i, (sev, _))| {
            Finding::new(format!("R{i}"), *sev, "m", "p", Position::default())
        })
        .collect();
        let raw = to_sarif(&findings).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        let results = value["runs"][0]["results"].as_array().unwrap();
        assert_eq!(results[0]["level"], "note");
        assert_eq!(results[1]["level"], "warning");
        assert_eq!(results[2]["level"], "error");
        assert_eq!(results[3]["level"], "error");
    }

    #[test]
    fn test_rule_description_truncated_to_80() {
        let long = "x".repeat(200);
        let findings = vec![Finding::new(
            "RULE",
            Severity::Low,
            long,
            "p",
            Position::default(),
        )];
        let raw = to_sarif(&findings).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        let desc = value["runs"][0]["tool"]["driver"]["rules"][0]["shortDescription"]["text"]
            .as_str()
            .unwrap();
        assert_eq!(desc.len(), 80);
    }

    #[test]
    fn test_threshold_monotonicity() {
        let findings = sample();
        // Worst severity is High.
        assert_eq!(worst_severity(&findings), Some(Severity::High));
        assert!(exceeds_threshold(&findings, Severity::Low));
        assert!(exceeds_threshold(&findings, Severity::Medium));
        assert!(exceeds_threshold(&findings, Severity::High));
        assert!(!exceeds_threshold(&findings, Severity::Critical));
        // Raising the threshold can only turn triggers off, never on.
        let thresholds = [
            Severity::Low,
            Severity::Medium,
            Severity::High,
            Severity::Critical,
        ];
        let trigger: Vec<bool> = thresholds
            .iter()
            .map(|t| exceeds_threshold(&findings, *t))
            .collect();
        for pair in trigger.windows(2) {
            assert!(pair[0] >= pair[1]);
        }
    }

    #[test]
    fn test_empty_set_never_exceeds() {
        assert_eq!(worst_severity(&[]), None);
        assert!(!exceeds_threshold(&[], Severity::Low));
    }
}
