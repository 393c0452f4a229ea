//! Minimal YAML-style frontmatter for chunk Markdown files: a `---`
//! delimited header of scalar/list fields, a blank line, then raw content.
//! Hand-rolled rather than pulled from `serde_yaml` because the field set
//! is fixed and small and the encoding only ever round-trips through this
//! module — never through a general YAML consumer.

use crate::chunks::entities::Entities;
use crate::error::{Result, RlmError};

#[derive(Debug, Clone)]
pub struct Frontmatter {
    pub summary: String,
    pub tags: Vec<String>,
    pub created_at: String,
    pub project: Option<String>,
    pub domain: Option<String>,
    pub ticket: Option<String>,
    pub entities: Entities,
}

pub fn render(fm: &Frontmatter, content: &str) -> String {
    let mut out = String::new();
    out.push_str("---\n");
    out.push_str(&format!("summary: {}\n", escape_scalar(&fm.summary)));
    out.push_str(&format!("tags: [{}]\n", fm.tags.join(", ")));
    out.push_str(&format!("created_at: {}\n", fm.created_at));
    if let Some(p) = &fm.project {
        out.push_str(&format!("project: {}\n", escape_scalar(p)));
    }
    if let Some(d) = &fm.domain {
        out.push_str(&format!("domain: {}\n", escape_scalar(d)));
    }
    if let Some(t) = &fm.ticket {
        out.push_str(&format!("ticket: {}\n", escape_scalar(t)));
    }
    out.push_str(&format!(
        "entities: {}\n",
        serde_json::to_string(&fm.entities).unwrap_or_else(|_| "{}".to_string())
    ));
    out.push_str("---\n\n");
    out.push_str(content);
    out
}

/// Split a chunk file's raw text into (frontmatter, content).
pub fn parse(raw: &str) -> Result<(Frontmatter, String)> {
    let raw = raw.strip_prefix('\u{feff}').unwrap_or(raw);
    if !raw.starts_with("---") {
        return Err(RlmError::EncodingError("missing frontmatter".into()));
    }

    let rest = &raw[3..];
    let end = rest
        .find("\n---")
        .ok_or_else(|| RlmError::EncodingError("unterminated frontmatter".into()))?;
    let header = &rest[..end];
    let after_delim = &rest[end + 4..];
    let content = after_delim.trim_start_matches('\n').to_string();

    let mut summary = String::new();
    let mut tags = Vec::new();
    let mut created_at = String::new();
    let mut project = None;
    let mut domain = None;
    let mut ticket = None;
    let mut entities = Entities::default();

    for line in header.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim();
        let value = value.trim();
        match key {
            "summary" => summary = unescape_scalar(value),
            "tags" => tags = parse_list(value),
            "created_at" => created_at = value.to_string(),
            "project" => project = Some(unescape_scalar(value)),
            "domain" => domain = Some(unescape_scalar(value)),
            "ticket" => ticket = Some(unescape_scalar(value)),
            "entities" => {
                entities = serde_json::from_str(value).unwrap_or_default();
            }
            _ => {}
        }
    }

    Ok((
        Frontmatter {
            summary,
            tags,
            created_at,
            project,
            domain,
            ticket,
            entities,
        },
        content,
    ))
}

fn parse_list(value: &str) -> Vec<String> {
    let inner = value.trim().trim_start_matches('[').trim_end_matches(']');
    inner
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn escape_scalar(s: &str) -> String {
    if s.contains(':') || s.contains('#') || s.starts_with(' ') {
        format!("\"{}\"", s.replace('"', "\\\""))
    } else {
        s.to_string()
    }
}

fn unescape_scalar(s: &str) -> String {
    if s.starts_with('"') && s.ends_with('"') && s.len() >= 2 {
        s[1..s.len() - 1].replace("\\\"", "\"")
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_preserves_content() {
        let fm = Frontmatter {
            summary: "API redesign notes".into(),
            tags: vec!["decision".into(), "api".into()],
            created_at: "2026-01-18T12:00:00Z".into(),
            project: Some("widget".into()),
            domain: Some("backend".into()),
            ticket: Some("JIRA-12".into()),
            entities: Entities::default(),
        };
        let body = "Decided to go with option B.\n\nMore detail here.";
        let rendered = render(&fm, body);
        let (parsed_fm, parsed_body) = parse(&rendered).unwrap();
        assert_eq!(parsed_body, body);
        assert_eq!(parsed_fm.summary, fm.summary);
        assert_eq!(parsed_fm.tags, fm.tags);
        assert_eq!(parsed_fm.project, fm.project);
    }

    #[test]
    fn rejects_missing_frontmatter() {
        assert!(parse("no frontmatter here").is_err());
    }
}
