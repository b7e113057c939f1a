//! Bilingual keyword extraction and term-frequency relevance scoring.
//!
//! Chinese text has no word delimiters, so every run of CJK ideographs is
//! expanded into its 1-, 2- and 3-character substrings. Latin text is split
//! into maximal letter runs with short words and stop words removed. Scores
//! are a length-normalized term frequency without any IDF component.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

static CJK_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\u{4e00}-\u{9fff}]+").expect("valid CJK run pattern"));

static LATIN_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[a-zA-Z]+").expect("valid Latin run pattern"));

static ASCII_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z]+$").expect("valid ASCII word pattern"));

static STOP_WORDS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
        "is", "are", "was", "were", "be", "been", "have", "has", "had", "do", "does", "did",
        "will", "would", "could", "should", "may", "might", "can", "this", "that", "these",
        "those",
    ]
    .into_iter()
    .collect()
});

/// Chinese section words and the English headings they usually map to in
/// English-language papers.
const SECTION_SYNONYMS: &[(&[&str], &[&str])] = &[
    (&["引言", "介绍", "导言"], &["introduction", "intro", "background"]),
    (&["方法", "方法论", "算法"], &["method", "methodology", "algorithm", "approach"]),
    (&["实验", "结果", "评估"], &["experiment", "result", "evaluation", "performance"]),
    (&["结论", "总结", "讨论"], &["conclusion", "discussion", "summary"]),
    (&["相关工作", "背景"], &["related work", "background", "literature"]),
];

/// Extract candidate terms from `text`.
///
/// CJK n-grams come first, then Latin words, deduplicated in first-seen
/// order. Latin words keep their case, so callers lowercase beforehand.
pub fn extract_keywords(text: &str) -> Vec<String> {
    let mut keywords = Vec::new();

    for run in CJK_RUN.find_iter(text) {
        let chars: Vec<char> = run.as_str().chars().collect();
        keywords.extend(chars.iter().map(|c| c.to_string()));
        keywords.extend(chars.windows(2).map(|w| w.iter().collect::<String>()));
        keywords.extend(chars.windows(3).map(|w| w.iter().collect::<String>()));
    }

    keywords.extend(
        LATIN_RUN
            .find_iter(text)
            .map(|m| m.as_str())
            .filter(|word| word.len() > 2 && !STOP_WORDS.contains(word.to_lowercase().as_str()))
            .map(str::to_string),
    );

    let mut seen = HashSet::new();
    keywords.retain(|keyword| seen.insert(keyword.clone()));
    keywords
}

/// English section headings implied by Chinese section words in `query`.
///
/// Groups are appended in a fixed order and are not deduplicated against
/// each other.
pub fn expand_section_terms(query: &str) -> Vec<String> {
    SECTION_SYNONYMS
        .iter()
        .filter(|(triggers, _)| triggers.iter().any(|word| query.contains(word)))
        .flat_map(|(_, synonyms)| synonyms.iter().map(|s| s.to_string()))
        .collect()
}

/// Query terms for free-text search: extracted keywords plus section synonyms.
pub fn query_terms(query: &str) -> Vec<String> {
    let query = query.to_lowercase();
    let mut terms = extract_keywords(&query);
    terms.extend(expand_section_terms(&query));
    terms
}

/// Relevance of lowercased `content` to `terms`; 0.0 means no match.
///
/// Each matching term adds `tf / (tf + 1) / (n / 100 + 1)` where `n` is the
/// number of distinct terms in the content. A term absent from the content's
/// terms falls back to a raw substring count, which catches CJK n-grams that
/// straddle the content's own n-gram boundaries.
pub fn score(content: &str, terms: &[String]) -> f64 {
    if terms.is_empty() {
        return 0.0;
    }

    let content_terms = extract_keywords(content);
    if content_terms.is_empty() {
        return 0.0;
    }
    let length_norm = 1.0 / (content_terms.len() as f64 / 100.0 + 1.0);

    terms
        .iter()
        .map(|term| {
            let mut tf = content_terms.iter().filter(|t| *t == term).count();
            if tf == 0 && term.chars().count() > 1 {
                tf = content.matches(term.as_str()).count();
            }
            if tf == 0 {
                return 0.0;
            }
            let tf = tf as f64;
            tf / (tf + 1.0) * length_norm
        })
        .sum()
}

/// Literal occurrences of lowercased keywords in `content`, case-insensitive.
///
/// Pure ASCII-letter keywords are counted on word boundaries; anything else
/// (Chinese, mixed, punctuation) is a plain substring count. Empty keywords
/// are ignored.
#[derive(Debug)]
pub struct KeywordMatcher {
    patterns: Vec<KeywordPattern>,
}

#[derive(Debug)]
enum KeywordPattern {
    Word(Regex),
    Substring(String),
}

impl KeywordMatcher {
    pub fn new<S: AsRef<str>>(keywords: &[S]) -> Self {
        let patterns = keywords
            .iter()
            .map(|keyword| keyword.as_ref().to_lowercase())
            .filter(|keyword| !keyword.is_empty())
            .map(|keyword| {
                if ASCII_WORD.is_match(&keyword) {
                    match Regex::new(&format!(r"\b{}\b", regex::escape(&keyword))) {
                        Ok(pattern) => KeywordPattern::Word(pattern),
                        Err(_) => KeywordPattern::Substring(keyword),
                    }
                } else {
                    KeywordPattern::Substring(keyword)
                }
            })
            .collect();
        Self { patterns }
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Total occurrences of every keyword in `content`.
    pub fn count(&self, content: &str) -> usize {
        let content = content.to_lowercase();
        self.patterns
            .iter()
            .map(|pattern| match pattern {
                KeywordPattern::Word(regex) => regex.find_iter(&content).count(),
                KeywordPattern::Substring(keyword) => content.matches(keyword.as_str()).count(),
            })
            .sum()
    }
}

/// Keep candidates with a positive score, best first, at most `top_k`.
///
/// The sort is stable: equal scores keep their input order.
pub fn rank<T, S>(candidates: impl IntoIterator<Item = (T, S)>, top_k: usize) -> Vec<(T, S)>
where
    S: Into<f64> + Copy,
{
    let value = |score: &S| -> f64 { (*score).into() };
    let mut ranked: Vec<(T, S)> =
        candidates.into_iter().filter(|(_, score)| value(score) > 0.0).collect();
    ranked.sort_by(|a, b| value(&b.1).total_cmp(&value(&a.1)));
    ranked.truncate(top_k);
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;

    fn terms(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn extracts_cjk_ngrams_and_latin_words() {
        let keywords = extract_keywords("深度学习 deep learning");
        for expected in ["深", "度", "深度", "度学", "深度学", "deep", "learning"] {
            assert!(keywords.contains(&expected.to_string()), "missing {expected}");
        }
        assert!(keywords.contains(&"学习".to_string()));
        assert!(keywords.contains(&"度学习".to_string()));
        assert!(!keywords.contains(&"深度学习".to_string()));
    }

    #[test]
    fn drops_short_and_stop_words() {
        let keywords = extract_keywords("the model is on an gpu and these results");
        assert_eq!(keywords, terms(&["model", "gpu", "results"]));
        assert!(extract_keywords("The").is_empty());
    }

    #[test]
    fn deduplicates_in_first_seen_order() {
        let keywords = extract_keywords("attention attention 注意 注意");
        assert_eq!(keywords, terms(&["注", "意", "注意", "attention"]));
    }

    #[test]
    fn latin_runs_split_on_digits_and_cjk() {
        let keywords = extract_keywords("bert2gpt模型");
        assert!(keywords.contains(&"bert".to_string()));
        assert!(keywords.contains(&"gpt".to_string()));
        assert!(keywords.contains(&"模型".to_string()));
    }

    #[test]
    fn section_words_expand_to_english_headings() {
        let expanded = expand_section_terms("这篇论文的方法是什么");
        assert_eq!(expanded, terms(&["method", "methodology", "algorithm", "approach"]));

        let expanded = expand_section_terms("背景和结论");
        assert_eq!(
            expanded,
            terms(&["conclusion", "discussion", "summary", "related work", "background", "literature"])
        );

        assert!(expand_section_terms("what is the method").is_empty());
    }

    #[test]
    fn score_is_zero_without_matches() {
        assert_eq!(score("unrelated filler text", &terms(&["transformers"])), 0.0);
        assert_eq!(score("", &terms(&["anything"])), 0.0);
        assert_eq!(score("some content", &[]), 0.0);
    }

    #[test]
    fn score_follows_length_normalized_tf() {
        // content terms: intro, section, about, transformers -> n = 4
        let value = score("intro section about transformers", &terms(&["transformers"]));
        let expected = 0.5 * (1.0 / (4.0 / 100.0 + 1.0));
        assert!((value - expected).abs() < 1e-12);
    }

    #[test]
    fn substring_fallback_counts_repeats() {
        // "related work" is never a single token, so it is counted as a substring
        let content = "related work and more related work";
        let value = score(content, &terms(&["related work"]));
        let n = extract_keywords(content).len() as f64;
        let expected = 2.0 / 3.0 * (1.0 / (n / 100.0 + 1.0));
        assert!((value - expected).abs() < 1e-12);
    }

    #[test]
    fn score_is_deterministic() {
        let content = "深度学习 methods for transformers";
        let query = query_terms("深度 transformers 方法");
        assert_eq!(score(content, &query), score(content, &query));
    }

    #[test]
    fn keyword_matcher_respects_word_boundaries() {
        let matcher = KeywordMatcher::new(&["Net"]);
        assert_eq!(matcher.count("net and network and NET."), 2);

        let matcher = KeywordMatcher::new(&["网络", "net"]);
        assert_eq!(matcher.count("神经网络 net 网络"), 3);

        assert!(KeywordMatcher::new(&[""]).is_empty());
    }

    #[test]
    fn rank_is_stable_and_drops_zero_scores() {
        let ranked = rank(vec![("a", 1.0), ("b", 0.0), ("c", 2.0), ("d", 1.0)], 10);
        let order: Vec<&str> = ranked.iter().map(|(id, _)| *id).collect();
        assert_eq!(order, vec!["c", "a", "d"]);

        let ranked = rank(vec![("a", 3u32), ("b", 3u32), ("c", 5u32)], 2);
        let order: Vec<&str> = ranked.iter().map(|(id, _)| *id).collect();
        assert_eq!(order, vec!["c", "a"]);
    }
}
