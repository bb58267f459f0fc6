//! Evaluator output classification.
//!
//! The external evaluator emits prose around its result, so violations are
//! located by marker search: a `[` opening a multi-line block, or the bare
//! empty-array literal. The string protocol is fragile by nature and is kept
//! behind this module so a structured output mode can replace it without
//! touching callers. Classification never fails; malformed output degrades
//! to a sentinel check or an empty list.

use serde_json::Value;

/// Synthetic violation returned when the evaluator reports the target rule
/// as undefined.
pub const RULE_NOT_DEFINED_MESSAGE: &str =
    "violations is not defined in the policy. Please defined a rule called violations";

/// Classified evaluator output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classified {
    /// One formatted string per reported violation.
    pub violations: Vec<String>,

    /// Raw output normalized for line-oriented log viewers.
    pub log: String,
}

/// Classify one raw evaluator transcript.
pub fn classify(raw: &str) -> Classified {
    Classified {
        violations: extract_violations(raw),
        log: normalize_log(raw),
    }
}

/// Normalize bare line feeds into CRLF pairs, leaving existing CRLF intact,
/// so line-oriented log viewers render each output line distinctly.
pub fn normalize_log(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut prev_cr = false;
    for ch in raw.chars() {
        if ch == '\n' && !prev_cr {
            out.push('\r');
        }
        prev_cr = ch == '\r';
        out.push(ch);
    }
    out
}

fn extract_violations(raw: &str) -> Vec<String> {
    if let Some(candidate) = json_candidate(raw) {
        if let Ok(Value::Array(items)) = serde_json::from_str::<Value>(candidate.trim()) {
            return items
                .iter()
                .map(|item| {
                    serde_json::to_string_pretty(item).unwrap_or_else(|_| item.to_string())
                })
                .collect();
        }
    }

    if rule_undefined(raw) {
        vec![RULE_NOT_DEFINED_MESSAGE.to_string()]
    } else {
        Vec::new()
    }
}

/// The candidate JSON value: from the first `[` that opens a multi-line
/// block (or, failing that, the first `[]`) to the end of the output.
fn json_candidate(raw: &str) -> Option<&str> {
    if let Some(pos) = raw.find("[\n").or_else(|| raw.find("[\r\n")) {
        return Some(&raw[pos..]);
    }
    raw.find("[]").map(|pos| &raw[pos..])
}

/// Whether the output reports the target rule as undefined: the literal
/// token at the very start, or alone on a line.
fn rule_undefined(raw: &str) -> bool {
    raw.starts_with("undefined") || raw.lines().any(|line| line.trim() == "undefined")
}
