//! Prompt templates and response sentinels for the semantic-review engine.
//!
//! Two prompting strategies exist, selected per file by whether stage-1
//! engines already reported on it. The gap-filling prompt asks for a full
//! review; the enrichment prompt lists the known findings and asks only for
//! issues they miss, so inference time goes to gaps instead of re-deriving
//! pattern-detectable problems.

use crate::core::Finding;

/// Response sentinel for a clean full review.
pub const NO_ISSUES_SENTINEL: &str = "NO_SECURITY_ISSUES_FOUND";

/// Response sentinel for an enrichment review that found nothing new.
pub const NO_ADDITIONAL_ISSUES_SENTINEL: &str = "NO_ADDITIONAL_ISSUES_FOUND";

/// Delimiter between vulnerability blocks in a review response.
pub const BLOCK_DELIMITER: &str = "---";

const RESPONSE_FORMAT: &str = "\
For each vulnerability found, respond in this EXACT format:

VULNERABILITY: <brief title>
SEVERITY: <CRITICAL|HIGH|MEDIUM|LOW>
LINE: <line number>
DESCRIPTION: <detailed explanation>
RECOMMENDATION: <how to fix>
---";

pub fn gap_filling_prompt(code: &str) -> String {
    format!(
        "You are a security expert reviewing code for vulnerabilities. Analyze the code below \
and identify ALL security issues, even if they appear to be in test files or have explanatory \
comments.

**CRITICAL VULNERABILITIES TO DETECT:**
1. **eval() or exec()**: Arbitrary code execution
2. **pickle.load()**: Unsafe deserialization
3. **os.system()**: Shell command injection
4. **subprocess with shell=True**: Command injection
5. **SQL string concatenation/f-strings**: SQL injection
6. **requests with verify=False**: Disabled SSL verification
7. **yaml.load() without SafeLoader**: Code execution via YAML
8. **Hardcoded secrets**: API keys, passwords, tokens in code
9. **Prompt Injection**: Unsanitized user input in LLM prompts
10. **Authentication Issues**: Missing or weak authentication
11. **Input Validation**: Missing validation on user inputs

**INSTRUCTIONS:**
- Report EVERY dangerous function call
- Report SQL queries using string concatenation
- Report hardcoded credentials and API keys
- Ignore comments - analyze the actual code
- Even if it's a test file, report all vulnerabilities

{RESPONSE_FORMAT}

If NO vulnerabilities found, respond with exactly: \"{NO_ISSUES_SENTINEL}\"

Code to review:
```
{code}
```

Your security analysis:"
    )
}

pub fn enrichment_prompt(code: &str, existing: &[&Finding]) -> String {
    let known: String = existing
        .iter()
        .map(|f| {
            format!(
                "- line {}: [{}] {} — {}\n",
                f.position.line,
                f.severity.to_string().to_uppercase(),
                f.rule_id,
                f.message
            )
        })
        .collect();

    format!(
        "You are a security expert reviewing code for vulnerabilities. Pattern-based tools have \
already analyzed this file and reported the issues listed below. Do NOT repeat them. Report ONLY \
new issues those tools missed: business-logic flaws, authentication gaps, injection paths the \
patterns cannot see, or insecure data handling.

**ALREADY REPORTED (do not repeat):**
{known}
{RESPONSE_FORMAT}

If NO additional issues exist beyond those already reported, respond with exactly: \
\"{NO_ADDITIONAL_ISSUES_SENTINEL}\"

Code to review:
```
{code}
```

Your security analysis:"
    )
}
