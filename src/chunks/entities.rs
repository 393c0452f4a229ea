//! Regex-based entity extraction: files, versions, modules, tickets,
//! functions mentioned in a chunk's content.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Entities {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub versions: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub modules: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tickets: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub functions: Vec<String>,
}

impl Entities {
    /// True if `needle` appears (substring, case-insensitive) in any category.
    pub fn contains(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        let all = self
            .files
            .iter()
            .chain(self.versions.iter())
            .chain(self.modules.iter())
            .chain(self.tickets.iter())
            .chain(self.functions.iter());
        all.any(|e| e.to_lowercase().contains(&needle))
    }
}

fn file_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b[\w./-]+/[\w.-]+\.[a-z0-9]{1,6}\b|\b[\w-]+\.(rs|py|ts|tsx|js|jsx|go|rb|java|md|toml|json|yaml|yml|c|cpp|h|hpp)\b").unwrap()
    })
}

fn version_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\bv?\d+\.\d+(?:\.\d+)?(?:-[a-zA-Z0-9.]+)?\b").unwrap())
}

fn module_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b[a-z][a-z0-9]*(?:_[a-z0-9]+)+\b|\b[a-z][a-z0-9]*(?:\.[a-z][a-z0-9]*){1,}\b").unwrap())
}

fn ticket_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b[A-Z]{2,}-\d+\b|#\d+\b").unwrap())
}

fn function_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b[A-Za-z_][A-Za-z0-9_]*\(\)").unwrap())
}

/// Extract all five entity categories from `content`.
pub fn extract_entities(content: &str) -> Entities {
    let files: Vec<String> = dedup_matches(file_re(), content);
    let versions: Vec<String> = dedup_matches(version_re(), content);
    let modules: Vec<String> = dedup_matches(module_re(), content)
        .into_iter()
        .filter(|m| m.len() >= 2)
        .collect();
    let tickets: Vec<String> = dedup_matches(ticket_re(), content);
    let functions: Vec<String> = dedup_matches(function_re(), content);

    Entities {
        files,
        versions,
        modules,
        tickets,
        functions,
    }
}

fn dedup_matches(re: &Regex, content: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for m in re.find_iter(content) {
        let s = m.as_str().to_string();
        if seen.insert(s.clone()) {
            out.push(s);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_files_and_functions() {
        let content = "Updated src/lib.rs, called parse_input() and wrote README.md";
        let e = extract_entities(content);
        assert!(e.files.iter().any(|f| f.contains("lib.rs")));
        assert!(e.functions.contains(&"parse_input()".to_string()));
    }

    #[test]
    fn extracts_versions_and_tickets() {
        let content = "Bumped to v1.2.3, see JIRA-482 and issue #77";
        let e = extract_entities(content);
        assert!(e.versions.iter().any(|v| v.contains("1.2.3")));
        assert!(e.tickets.contains(&"JIRA-482".to_string()));
        assert!(e.tickets.contains(&"#77".to_string()));
    }

    #[test]
    fn extracts_modules() {
        let content = "see auth_handler and net.http.client for details";
        let e = extract_entities(content);
        assert!(e.modules.contains(&"auth_handler".to_string()));
    }

    #[test]
    fn contains_is_case_insensitive_substring() {
        let e = extract_entities("touching src/Auth.rs");
        assert!(e.contains("auth"));
    }
}
