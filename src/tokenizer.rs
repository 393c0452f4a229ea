//! Accent-stripping Unicode tokenizer with combined FR+EN stopwords,
//! hyphen splitting, and a minimum token length of 2.

use std::collections::HashSet;
use std::sync::OnceLock;

/// Tokenize `text`, optionally removing stopwords. Deterministic and
/// locale-independent: lowercasing and NFD-style accent stripping are
/// applied unconditionally.
pub fn tokenize(text: &str, remove_stopwords: bool) -> Vec<String> {
    let folded = fold_accents(&text.to_lowercase());
    let mut tokens = Vec::new();

    for run in extract_runs(&folded) {
        for part in run.split('-') {
            if part.len() >= 2 {
                tokens.push(part.to_string());
            }
        }
    }

    if remove_stopwords {
        let stop = stopwords();
        tokens.retain(|t| !stop.contains(t.as_str()));
    }

    tokens
}

/// Extract maximal runs of `[a-z0-9]+(?:-[a-z0-9]+)*`.
fn extract_runs(s: &str) -> Vec<String> {
    let mut runs = Vec::new();
    let mut current = String::new();

    let is_run_char = |c: char| c.is_ascii_alphanumeric() || c == '-';

    for c in s.chars() {
        if is_run_char(c) {
            current.push(c);
        } else if !current.is_empty() {
            runs.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        runs.push(current);
    }

    // trim leading/trailing hyphens produced at run boundaries
    runs.into_iter()
        .map(|r| r.trim_matches('-').to_string())
        .filter(|r| !r.is_empty())
        .collect()
}

/// Strip combining marks by NFD-equivalent decomposition over the small
/// set of accented Latin letters this corpus actually sees (French +
/// common English loanwords). Avoids pulling in a full Unicode
/// normalization crate for a narrow accent-folding need.
fn fold_accents(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            'à' | 'â' | 'ä' | 'á' | 'ã' | 'å' => 'a',
            'ç' => 'c',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'î' | 'ï' | 'í' | 'ì' => 'i',
            'ô' | 'ö' | 'ó' | 'ò' | 'õ' => 'o',
            'ù' | 'û' | 'ü' | 'ú' => 'u',
            'ÿ' | 'ý' => 'y',
            'ñ' => 'n',
            'œ' => 'o',
            'æ' => 'a',
            other => other,
        })
        .collect()
}

fn stopwords() -> &'static HashSet<&'static str> {
    static SET: OnceLock<HashSet<&'static str>> = OnceLock::new();
    SET.get_or_init(|| {
        const EN: &[&str] = &[
            "a", "about", "above", "after", "again", "against", "all", "am", "an", "and", "any",
            "are", "aren't", "as", "at", "be", "because", "been", "before", "being", "below",
            "between", "both", "but", "by", "can", "did", "do", "does", "doing", "down", "during",
            "each", "few", "for", "from", "further", "had", "has", "have", "having", "he", "her",
            "here", "hers", "herself", "him", "himself", "his", "how", "i", "if", "in", "into",
            "is", "it", "its", "itself", "just", "me", "more", "most", "my", "myself", "no", "nor",
            "not", "now", "of", "off", "on", "once", "only", "or", "other", "our", "ours",
            "ourselves", "out", "over", "own", "same", "she", "should", "so", "some", "such",
            "than", "that", "the", "their", "theirs", "them", "themselves", "then", "there",
            "these", "they", "this", "those", "through", "to", "too", "under", "until", "up",
            "very", "was", "we", "were", "what", "when", "where", "which", "while", "who", "whom",
            "why", "will", "with", "would", "you", "your", "yours", "yourself", "yourselves",
        ];
        const FR: &[&str] = &[
            "au", "aux", "avec", "ce", "ces", "dans", "de", "des", "du", "elle", "en", "et", "eux",
            "il", "je", "la", "le", "leur", "lui", "ma", "mais", "me", "meme", "mes", "moi", "mon",
            "ne", "nos", "notre", "nous", "on", "ou", "par", "pas", "pour", "qu", "que", "qui",
            "sa", "se", "ses", "son", "sur", "ta", "te", "tes", "toi", "ton", "tu", "un", "une",
            "vos", "votre", "vous", "c", "d", "j", "l", "n", "s", "y", "est", "sont", "etre",
            "avoir", "fait", "plus", "tout", "tres", "comme", "cette", "cet",
        ];
        EN.iter().chain(FR.iter()).copied().collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercase_and_strip_accents() {
        let tokens = tokenize("Décision IMPORTANTE", false);
        assert_eq!(tokens, vec!["decision", "importante"]);
    }

    #[test]
    fn drops_short_tokens() {
        let tokens = tokenize("a ab abc", false);
        assert_eq!(tokens, vec!["ab", "abc"]);
    }

    #[test]
    fn splits_on_hyphen() {
        let tokens = tokenize("multi-word-token", false);
        assert_eq!(tokens, vec!["multi", "word", "token"]);
    }

    #[test]
    fn removes_stopwords_both_languages() {
        let tokens = tokenize("the decision and la decision", true);
        assert_eq!(tokens, vec!["decision", "decision"]);
    }

    #[test]
    fn deterministic_across_calls() {
        let a = tokenize("API redesign discussion", true);
        let b = tokenize("API redesign discussion", true);
        assert_eq!(a, b);
    }
}
