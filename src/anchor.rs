//! Anchor phrase extraction and scoring against target page content.
//!
//! Candidates come from a two-tier extractor: a heuristic part-of-speech pass
//! keeping maximal "adjectives then nouns" runs, and a sliding word-window
//! fallback used only when the primary pass yields nothing. Surviving
//! candidates are cleaned of stop words and scored by whole-word overlap with
//! the target text; anything under the configured overlap floor is rejected.

use std::collections::HashSet;

use clap::ValueEnum;
use tracing::debug;

use crate::config::LinkingConfig;

/// Stop words removed from candidate phrases before length checks.
const STOP_WORDS: &[&str] = &[
    "the", "and", "to", "of", "that", "is", "with", "for", "in", "on", "by", "as", "at", "from",
    "this", "it", "are", "be",
];

/// Function words the heuristic tagger never treats as nouns or adjectives.
const CLOSED_CLASS: &[&str] = &[
    "a", "about", "across", "after", "all", "along", "also", "am", "an", "and", "any", "are",
    "as", "at", "basically", "be", "because", "been", "before", "behind", "being", "between",
    "beyond", "both", "but", "by", "can", "could", "did", "do", "does", "down", "during", "each",
    "else", "every", "few", "for", "from", "had", "has", "have", "he", "her", "here", "his",
    "how", "i", "if", "in", "into", "is", "it", "its", "just", "may", "me", "might", "more",
    "most", "must", "my", "no", "nor", "not", "of", "off", "on", "only", "onto", "or", "other",
    "our", "out", "over", "own", "same", "shall", "she", "should", "so", "some", "such", "than",
    "that", "the", "their", "them", "then", "there", "these", "they", "this", "those", "through",
    "to", "too", "under", "up", "very", "was", "we", "were", "what", "when", "where", "which",
    "while", "who", "whom", "why", "will", "with", "within", "without", "would", "yet", "you",
    "your",
];

const ADJECTIVE_SUFFIXES: &[&str] = &[
    "ous", "ful", "ive", "able", "ible", "ish", "ical", "ing", "ed",
];

/// How a source page is scanned for anchor candidates.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, ValueEnum, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScanStrategy {
    /// Score every candidate phrase from the whole page and require the
    /// overlap floor; no unscored fallback. The default policy.
    #[default]
    FullPage,
    /// Legacy policy: stop at the first sentence that yields any anchor,
    /// falling back to the first grammatically valid phrase, unscored, when
    /// no scored candidate survives.
    FirstSentence,
}

/// Extracts and scores anchor phrases for one source/target page pair.
#[derive(Debug, Clone)]
pub struct AnchorEngine {
    config: LinkingConfig,
}

impl AnchorEngine {
    /// Builds an engine around the link policy section.
    pub fn new(config: LinkingConfig) -> Self {
        Self { config }
    }

    /// Picks the best anchor from `source_text` for a link to a page with
    /// `target_text`, or `None` when no candidate clears the policy.
    pub fn select_anchor(&self, source_text: &str, target_text: &str) -> Option<String> {
        if source_text.is_empty() || target_text.is_empty() {
            return None;
        }
        let target_words = word_set(target_text);

        match self.config.scan_strategy {
            ScanStrategy::FullPage => self.scored_anchor(source_text, &target_words),
            ScanStrategy::FirstSentence => self.first_sentence_anchor(source_text, &target_words),
        }
    }

    /// Scored-only selection over one stretch of text.
    fn scored_anchor(&self, text: &str, target_words: &HashSet<String>) -> Option<String> {
        let mut scored: Vec<(String, usize)> = Vec::new();
        for candidate in self.extract_candidates(text) {
            let Some(cleaned) = self.clean_candidate(&candidate) else {
                continue;
            };
            let score = overlap_score(&cleaned, target_words);
            if score >= self.config.min_anchor_overlap {
                scored.push((cleaned, score));
            }
        }

        scored.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| b.0.len().cmp(&a.0.len())));
        let (anchor, score) = scored.into_iter().next()?;
        debug!(%anchor, score, "selected scored anchor");
        Some(anchor)
    }

    /// Legacy scan: first sentence producing any anchor wins, with an
    /// explicitly weaker unscored tier when scoring comes up empty.
    fn first_sentence_anchor(
        &self,
        source_text: &str,
        target_words: &HashSet<String>,
    ) -> Option<String> {
        for sentence in split_sentences(source_text) {
            if let Some(anchor) = self.scored_anchor(sentence, target_words) {
                return Some(anchor);
            }
            if let Some(anchor) = self.unscored_fallback(sentence) {
                debug!(%anchor, "selected unscored fallback anchor");
                return Some(anchor);
            }
        }
        None
    }

    /// First grammatically valid phrase visible in the sentence, unscored.
    fn unscored_fallback(&self, sentence: &str) -> Option<String> {
        extract_pos_phrases(sentence, self.config.min_anchor_words, self.config.max_anchor_words)
            .into_iter()
            .find_map(|phrase| self.clean_candidate(&phrase))
    }

    /// Two-tier extraction: part-of-speech runs first, word windows only when
    /// the primary tier finds nothing.
    fn extract_candidates(&self, text: &str) -> Vec<String> {
        let min = self.config.min_anchor_words;
        let max = self.config.max_anchor_words;
        let phrases = extract_pos_phrases(text, min, max);
        if !phrases.is_empty() {
            return phrases;
        }
        debug!("primary phrase extraction found nothing, using word windows");
        extract_window_phrases(text, min, max)
    }

    /// Removes stop words and re-checks the word-count bounds.
    fn clean_candidate(&self, phrase: &str) -> Option<String> {
        let kept: Vec<&str> = phrase
            .split_whitespace()
            .filter(|word| !STOP_WORDS.contains(word))
            .collect();
        let bounds = self.config.min_anchor_words..=self.config.max_anchor_words;
        bounds.contains(&kept.len()).then(|| kept.join(" "))
    }
}

/// Lowercased alphabetic-ish tokens in document order.
fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(|token| token.to_lowercase())
        .collect()
}

/// Whole-word set of the target text, used for overlap scoring.
fn word_set(text: &str) -> HashSet<String> {
    tokenize(text).into_iter().collect()
}

/// Count of candidate words that also appear in the target text.
fn overlap_score(phrase: &str, target_words: &HashSet<String>) -> usize {
    phrase
        .split_whitespace()
        .filter(|word| target_words.contains(*word))
        .count()
}

#[derive(Copy, Clone, PartialEq, Eq)]
enum WordClass {
    Noun,
    Adjective,
    Other,
}

/// Heuristic tagger: closed-class list, adverb/adjective suffix rules,
/// content words default to noun.
fn classify(word: &str) -> WordClass {
    if word.len() < 3
        || word.chars().any(|c| c.is_ascii_digit())
        || CLOSED_CLASS.contains(&word)
    {
        return WordClass::Other;
    }
    if word.ends_with("ly") {
        return WordClass::Other;
    }
    if ADJECTIVE_SUFFIXES.iter().any(|suffix| word.ends_with(suffix)) {
        return WordClass::Adjective;
    }
    WordClass::Noun
}

/// Maximal "zero or more adjectives followed by one or more nouns" runs whose
/// word count is within `[min_words, max_words]`.
fn extract_pos_phrases(text: &str, min_words: usize, max_words: usize) -> Vec<String> {
    let tokens = tokenize(text);
    let mut phrases = Vec::new();
    let mut adjectives: Vec<String> = Vec::new();
    let mut nouns: Vec<String> = Vec::new();

    let mut flush = |adjectives: &mut Vec<String>, nouns: &mut Vec<String>| {
        if !nouns.is_empty() {
            let length = adjectives.len() + nouns.len();
            if (min_words..=max_words).contains(&length) {
                let mut words = std::mem::take(adjectives);
                words.append(nouns);
                phrases.push(words.join(" "));
            }
        }
        adjectives.clear();
        nouns.clear();
    };

    for token in tokens {
        match classify(&token) {
            WordClass::Adjective => {
                // An adjective after nouns ends the current run and starts
                // the prefix of the next one.
                if !nouns.is_empty() {
                    flush(&mut adjectives, &mut nouns);
                }
                adjectives.push(token);
            }
            WordClass::Noun => nouns.push(token),
            WordClass::Other => flush(&mut adjectives, &mut nouns),
        }
    }
    flush(&mut adjectives, &mut nouns);

    phrases
}

/// Fallback tier: sliding windows of contiguous alphabetic words (3+ letters).
fn extract_window_phrases(text: &str, min_words: usize, max_words: usize) -> Vec<String> {
    let words: Vec<String> = tokenize(text)
        .into_iter()
        .filter(|word| word.len() >= 3 && word.chars().all(|c| c.is_alphabetic()))
        .collect();

    let mut phrases = Vec::new();
    for start in 0..words.len() {
        for size in min_words..=max_words {
            let end = start + size;
            if end > words.len() {
                break;
            }
            phrases.push(words[start..end].join(" "));
        }
    }
    phrases
}

/// Splits text on sentence-ending punctuation followed by whitespace.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let bytes = text.as_bytes();
    let mut start = 0;
    let mut i = 0;
    while i < bytes.len() {
        if matches!(bytes[i], b'.' | b'!' | b'?') {
            let mut end = i + 1;
            while end < bytes.len() && matches!(bytes[end], b'.' | b'!' | b'?') {
                end += 1;
            }
            if end >= bytes.len() || bytes[end].is_ascii_whitespace() {
                let sentence = text[start..end].trim();
                if !sentence.is_empty() {
                    sentences.push(sentence);
                }
                start = end;
                i = end;
                continue;
            }
        }
        i += 1;
    }
    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail);
    }
    sentences
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> AnchorEngine {
        AnchorEngine::new(LinkingConfig::default())
    }

    fn legacy_engine() -> AnchorEngine {
        let config = LinkingConfig {
            scan_strategy: ScanStrategy::FirstSentence,
            ..LinkingConfig::default()
        };
        AnchorEngine::new(config)
    }

    #[test]
    fn finds_overlapping_anchor() {
        let source = "This page explains container networking fundamentals.";
        let target = "Container networking fundamentals require understanding subnets and bridges.";
        let anchor = engine().select_anchor(source, target).expect("anchor");

        let words = anchor.split_whitespace().count();
        assert!((2..=5).contains(&words), "anchor '{anchor}' out of bounds");
        assert!(anchor.contains("container") || anchor.contains("networking"));
    }

    #[test]
    fn rejects_unrelated_target() {
        let source = "Our newsletter covers email campaigns and subscriber growth.";
        let target = "Kubernetes schedules workloads across node pools automatically.";
        assert_eq!(engine().select_anchor(source, target), None);
    }

    #[test]
    fn anchors_are_lowercased_source_phrases() {
        let source = "Docker Compose simplifies local development workflows significantly.";
        let target = "Local development workflows improve with docker compose usage.";
        let anchor = engine().select_anchor(source, target).expect("anchor");
        assert_eq!(anchor, anchor.to_lowercase());
    }

    #[test]
    fn higher_overlap_wins() {
        let source =
            "Database indexing matters. Database replication and database backup strategies matter more.";
        let target = "We cover database replication, database backup strategies, and recovery.";
        let anchor = engine().select_anchor(source, target).expect("anchor");
        assert!(anchor.contains("replication") || anchor.contains("backup"));
    }

    #[test]
    fn empty_inputs_yield_no_anchor() {
        assert_eq!(engine().select_anchor("", "target words here"), None);
        assert_eq!(engine().select_anchor("source words here", ""), None);
    }

    #[test]
    fn pos_runs_respect_the_grammar() {
        let phrases = extract_pos_phrases("the powerful container runtime starts quickly", 2, 5);
        assert!(phrases.iter().any(|p| p.contains("container runtime")));
        // "quickly" is adverbial and must never enter a phrase.
        assert!(phrases.iter().all(|p| !p.contains("quickly")));
    }

    #[test]
    fn window_fallback_produces_bounded_phrases() {
        let phrases = extract_window_phrases("alpha beta gamma delta", 2, 3);
        assert!(phrases.contains(&"alpha beta".to_string()));
        assert!(phrases.contains(&"beta gamma delta".to_string()));
        assert!(phrases.iter().all(|p| {
            let n = p.split_whitespace().count();
            (2..=3).contains(&n)
        }));
    }

    #[test]
    fn stop_words_are_removed_from_candidates() {
        let cleaned = engine().clean_candidate("state of the art").expect("cleaned");
        assert_eq!(cleaned, "state art");
    }

    #[test]
    fn over_long_candidates_are_discarded_after_cleaning() {
        assert_eq!(
            engine().clean_candidate("alpha beta gamma delta epsilon zeta"),
            None
        );
    }

    #[test]
    fn sentence_splitting_handles_terminators() {
        let sentences = split_sentences("First point. Second point! Third?");
        assert_eq!(
            sentences,
            vec!["First point.", "Second point!", "Third?"]
        );
    }

    #[test]
    fn legacy_scan_returns_fallback_when_nothing_scores() {
        let source = "Container runtimes isolate processes. More unrelated prose follows here.";
        let target = "Completely different subject matter about gardening and flowers.";
        // The scored tier rejects everything, so the legacy policy still
        // produces the first valid phrase on the page.
        let anchor = legacy_engine().select_anchor(source, target).expect("anchor");
        assert!(!anchor.is_empty());
    }

    #[test]
    fn default_scan_never_uses_the_unscored_tier() {
        let source = "Container runtimes isolate processes. More unrelated prose follows here.";
        let target = "Completely different subject matter about gardening and flowers.";
        assert_eq!(engine().select_anchor(source, target), None);
    }
}
