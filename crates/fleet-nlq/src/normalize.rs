//! Turkish-aware text normalization.
//!
//! Folds Turkish letters to their ASCII base, lowercases, collapses
//! punctuation runs into single spaces and strips a fixed stop-word list for
//! trigger matching. Entity extraction reads the unstripped normalized text,
//! because stop words can sit right next to identifiers ("70886 ve 71234").

use serde::{Deserialize, Serialize};

/// Conjunctions and particles that carry no routing signal.
const STOP_WORDS: &[&str] = &[
    "ve", "veya", "ile", "icin", "gibi", "ama", "fakat", "ancak", "ise", "ki", "mi", "mu", "bir",
    "bu", "su", "o", "acaba",
];

/// A question after normalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedText {
    /// Folded, lowercased text with punctuation collapsed. Stop words kept.
    pub text: String,
    /// Tokens of `text` with stop words removed.
    pub tokens: Vec<String>,
}

/// Maps a character to its folded form, or `None` for separators.
///
/// Covers the six Turkish letters in both cases plus the circumflex vowels
/// used in loanwords ("kâr"). `İ` is mapped directly because its Unicode
/// lowercase form is "i" followed by a combining dot.
fn fold_char(c: char) -> Option<char> {
    match c {
        'ı' | 'İ' | 'î' | 'Î' => Some('i'),
        'ş' | 'Ş' => Some('s'),
        'ğ' | 'Ğ' => Some('g'),
        'ç' | 'Ç' => Some('c'),
        'ö' | 'Ö' => Some('o'),
        'ü' | 'Ü' => Some('u'),
        'â' | 'Â' => Some('a'),
        'û' | 'Û' => Some('u'),
        c if c.is_ascii_alphanumeric() => Some(c.to_ascii_lowercase()),
        _ => None,
    }
}

/// Normalizes a raw question. Empty or punctuation-only input produces an
/// empty token list, which the router surfaces as an empty-question outcome.
pub fn normalize(raw: &str) -> NormalizedText {
    let mut text = String::with_capacity(raw.len());
    let mut pending_space = false;
    for c in raw.chars() {
        match fold_char(c) {
            Some(folded) => {
                if pending_space && !text.is_empty() {
                    text.push(' ');
                }
                pending_space = false;
                text.push(folded);
            }
            None => pending_space = true,
        }
    }

    let tokens = text
        .split_whitespace()
        .filter(|t| !is_stop_word(t))
        .map(str::to_string)
        .collect();

    NormalizedText { text, tokens }
}

/// Whether a folded word carries no routing signal on its own.
pub fn is_stop_word(word: &str) -> bool {
    STOP_WORDS.contains(&word)
}

/// Token-level keyword match with suffix tolerance: exact hit, or a prefix
/// hit when the keyword is long enough that an agglutinative suffix is the
/// plausible remainder ("gecmisi" matches "gecmis", "zaman" never matches
/// "man").
pub fn token_matches(token: &str, word: &str) -> bool {
    token == word || (word.len() >= 4 && token.starts_with(word))
}

/// All words of `phrase` occur somewhere in the token set. Co-occurrence
/// rather than adjacency, to tolerate Turkish word-order flexibility.
pub fn has_phrase(tokens: &[String], phrase: &str) -> bool {
    phrase
        .split_whitespace()
        .all(|word| tokens.iter().any(|token| token_matches(token, word)))
}

pub fn has_any_phrase(tokens: &[String], phrases: &[&str]) -> bool {
    phrases.iter().any(|phrase| has_phrase(tokens, phrase))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turkish_folding() {
        let n = normalize("Kış aylarında EN ÇOK görülen arızalar");
        assert_eq!(n.text, "kis aylarinda en cok gorulen arizalar");
    }

    #[test]
    fn test_dotted_capital_i_folds_to_plain_i() {
        assert_eq!(normalize("İstanbul İÇİN").text, "istanbul icin");
    }

    #[test]
    fn test_punctuation_collapses_to_single_spaces() {
        let n = normalize("  5. ay -- bakım?!  ");
        assert_eq!(n.text, "5 ay bakim");
    }

    #[test]
    fn test_apostrophes_split_proper_noun_suffixes() {
        assert_eq!(normalize("Ford'un araçları").text, "ford un araclari");
    }

    #[test]
    fn test_stop_words_stripped_from_tokens_only() {
        let n = normalize("MAN ve Mercedes için bakım");
        assert_eq!(n.text, "man ve mercedes icin bakim");
        assert_eq!(n.tokens, vec!["man", "mercedes", "bakim"]);
    }

    #[test]
    fn test_normalization_is_idempotent() {
        let once = normalize("Kış aylarında en sık görülen arızalar!");
        let twice = normalize(&once.text);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_empty_input_yields_no_tokens() {
        let n = normalize("   \t ");
        assert!(n.text.is_empty());
        assert!(n.tokens.is_empty());
    }

    #[test]
    fn test_suffix_tolerant_matching() {
        assert!(token_matches("gecmisi", "gecmis"));
        assert!(token_matches("ariza", "ariza"));
        // Short keywords only match exactly.
        assert!(!token_matches("zaman", "man"));
        assert!(!token_matches("kisa", "kis"));
    }

    #[test]
    fn test_phrase_co_occurrence() {
        let n = normalize("en çok kullanılan malzeme");
        assert!(has_phrase(&n.tokens, "en cok"));
        // Word order does not matter.
        assert!(has_phrase(&n.tokens, "malzeme kullanilan"));
        assert!(!has_phrase(&n.tokens, "en az"));
        assert!(has_any_phrase(&n.tokens, &["en az", "en cok"]));
    }
}
