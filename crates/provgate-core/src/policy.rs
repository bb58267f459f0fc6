//! Policy package extraction.
//!
//! A policy document addresses its `violations` rule through the dotted
//! package name declared at the top of the document. The declaration pattern
//! admits identifier characters and dots only, so a successful extraction is
//! also the sanitization gate before the name is placed on the evaluator
//! command line.

use regex::Regex;
use std::sync::OnceLock;

const PACKAGE_PATTERN: &str = r"(?m)^\s*package\s+([A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z_][A-Za-z0-9_]*)*)";

fn package_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(PACKAGE_PATTERN).expect("package pattern compiles"))
}

/// Extract the package identifier from the first `package x.y` declaration.
///
/// Returns `None` when the policy carries no declaration, in which case no
/// subprocess may be launched against it.
pub fn package_name(policy: &str) -> Option<String> {
    package_regex()
        .captures(policy)
        .map(|caps| caps[1].to_string())
}
