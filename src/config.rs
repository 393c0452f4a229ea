use std::path::PathBuf;

use crate::error::{Result, RlmError};

/// Which embedding backend was selected via `RLM_EMBEDDING_PROVIDER`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Model2Vec,
    FastEmbed,
    None,
}

impl ProviderKind {
    pub fn tag(self) -> &'static str {
        match self {
            ProviderKind::Model2Vec => "model2vec",
            ProviderKind::FastEmbed => "fastembed",
            ProviderKind::None => "none",
        }
    }

    /// Resolve from `RLM_EMBEDDING_PROVIDER`. Unset or unrecognized values
    /// fall back to model2vec (best-available), never to an error — a
    /// missing/garbled env var is not a reason to refuse to start.
    fn from_env() -> Self {
        match std::env::var("RLM_EMBEDDING_PROVIDER").as_deref() {
            Ok("model2vec") => ProviderKind::Model2Vec,
            Ok("fastembed") => ProviderKind::FastEmbed,
            Ok("none") | Ok("disabled") => ProviderKind::None,
            _ => ProviderKind::Model2Vec,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Root of the on-disk storage layout (index.json, chunks/, archive/, …).
    pub storage_root: PathBuf,
    /// Project detected/overridden for this process.
    pub project: String,
    /// Embedding backend selected at startup.
    pub provider: ProviderKind,
}

impl Config {
    pub fn load() -> Result<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| RlmError::Config("could not determine home directory".into()))?;

        let storage_root = home.join(".claude").join("rlm").join("context");
        let project = detect_project();
        let provider = ProviderKind::from_env();

        Ok(Config {
            storage_root,
            project,
            provider,
        })
    }

    /// Construct a config rooted at an explicit directory (tests, CLI `--storage-root`).
    pub fn with_root(storage_root: PathBuf) -> Self {
        Config {
            storage_root,
            project: detect_project(),
            provider: ProviderKind::from_env(),
        }
    }
}

/// Project auto-detection: `RLM_PROJECT` env, then nearest `.git` root,
/// then current directory basename — each sanitized to the chunk ID
/// allowlist `[A-Za-z0-9_.&-]`.
pub fn detect_project() -> String {
    if let Ok(p) = std::env::var("RLM_PROJECT") {
        let s = sanitize_project(&p);
        if !s.is_empty() {
            return s;
        }
    }

    if let Ok(cwd) = std::env::current_dir() {
        if let Some(git_root) = find_git_root(&cwd) {
            if let Some(name) = git_root.file_name() {
                let s = sanitize_project(&name.to_string_lossy());
                if !s.is_empty() {
                    return s;
                }
            }
        }

        if let Some(name) = cwd.file_name() {
            let s = sanitize_project(&name.to_string_lossy());
            if !s.is_empty() {
                return s;
            }
        }
    }

    "default".to_string()
}

fn find_git_root(start: &std::path::Path) -> Option<PathBuf> {
    let mut dir = start;
    loop {
        if dir.join(".git").exists() {
            return Some(dir.to_path_buf());
        }
        dir = dir.parent()?;
    }
}

fn sanitize_project(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || "_.&-".contains(c) {
                c
            } else {
                '-'
            }
        })
        .collect::<String>()
        .trim_matches('-')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_replaces_unsafe_chars() {
        assert_eq!(sanitize_project("my project!"), "my-project");
        assert_eq!(sanitize_project("clean-name"), "clean-name");
    }

    #[test]
    fn provider_kind_tags() {
        assert_eq!(ProviderKind::Model2Vec.tag(), "model2vec");
        assert_eq!(ProviderKind::None.tag(), "none");
    }
}
