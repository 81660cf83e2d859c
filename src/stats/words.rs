use crate::model::{Commit, MessageWord};
use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

const STOP_WORDS: &[&str] = &[
    "the", "and", "for", "are", "but", "not", "you", "all", "can", "her", "was", "one", "our",
    "out", "day", "get", "use", "man", "new", "now", "way", "may", "say", "each", "which",
    "their", "time", "will", "about", "if", "up", "many", "then", "them", "these", "so", "some",
    "would", "make", "like", "into", "him", "has", "two", "more", "very", "what", "know", "just",
    "first", "could", "any", "my", "than", "much", "your", "how", "said", "she", "his", "been",
    "have", "there", "we", "were", "they", "who", "oil", "its", "find", "long", "down", "did",
    "come", "made", "part",
];

fn stop_words() -> &'static HashSet<&'static str> {
    static WORDS: OnceLock<HashSet<&'static str>> = OnceLock::new();
    WORDS.get_or_init(|| STOP_WORDS.iter().copied().collect())
}

/// Lower-cased alphanumeric runs of at least `min_len` characters that are
/// not stop words.
pub fn tokenize(message: &str, min_len: usize) -> impl Iterator<Item = String> + '_ {
    message
        .split(|c: char| !c.is_alphanumeric())
        .filter(move |token| token.chars().count() >= min_len)
        .map(str::to_lowercase)
        .filter(|token| !stop_words().contains(token.as_str()))
}

/// Most frequent message words, ties in alphabetical order.
pub fn top_words(commits: &[Commit], limit: usize, min_len: usize) -> Vec<MessageWord> {
    let mut counts: HashMap<String, u64> = HashMap::new();
    for commit in commits {
        for token in tokenize(&commit.message, min_len) {
            *counts.entry(token).or_insert(0) += 1;
        }
    }

    let mut words: Vec<(String, u64)> = counts.into_iter().collect();
    words.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    words
        .into_iter()
        .take(limit)
        .map(|(word, count)| MessageWord {
            weight: (count as f64).log2() + 1.0,
            word,
            count,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizer_drops_short_and_common_words() {
        let tokens: Vec<String> = tokenize("Fix the parser: handle EOF in 2 places", 3).collect();
        assert_eq!(tokens, vec!["fix", "parser", "handle", "eof", "places"]);
    }

    #[test]
    fn tokenizer_splits_on_punctuation() {
        let tokens: Vec<String> = tokenize("refactor(store)/write-batch", 3).collect();
        assert_eq!(tokens, vec!["refactor", "store", "write", "batch"]);
    }
}
