//! Entity extraction over normalized question text.
//!
//! Each sub-extractor is independent and purely lexical; together they fill
//! an [`EntityBag`]. Extractors that consume a span claim the words covered
//! by it, so later, looser extractors do not re-read the same characters:
//! the "12" in "son 12 ay" is a window length, not a month, and the "404" in
//! "ilk rhc 404" is a model number, not a result limit.

use std::sync::LazyLock;

use regex::Regex;

use crate::normalize::{has_any_phrase, is_stop_word, normalize, token_matches, NormalizedText};
use crate::types::{EntityBag, Manufacturer, RelativeUnit, RelativeWindow, Season, VehicleType};

// ============================================================================
// Patterns
// ============================================================================

static RELATIVE_WINDOW_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bson (\d{1,3}) (ay|yil)(?:i|da|inda|lik|lar|larda)?\b")
        .expect("relative window regex is valid")
});

static MODEL_PAIR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\brhc (\d{3,4}) (\d{3,4})\b").expect("model pair regex is valid")
});

static MODEL_SINGLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\brhc \d{3,4}\b").expect("model regex is valid"));

/// Hyphen-joined year spans survive only in the raw text; normalization
/// folds the hyphen into a space.
static YEAR_SPAN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d{4})\s*[-–—]\s*(\d{4})\b").expect("year span regex is valid")
});

static YEAR_PAIR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{4}) ve (\d{4})\b").expect("year pair regex is valid"));

static MONTH_ORDINAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(1[0-2]|[1-9]) ay(?:i|da|inda|larda|larinda)?\b")
        .expect("month ordinal regex is valid")
});

static SERVICE_CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\br(\d{3,4})\b").expect("service code regex is valid"));

/// Fault codes are matched on the raw text; normalization would destroy the
/// uppercase shape that distinguishes them from ordinary words.
static FAULT_CODE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[A-Z]{2,}[0-9]+[A-Z0-9]*\b").expect("fault code regex is valid")
});

static TOP_LIMIT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:en (?:cok|fazla|sik|yuksek|dusuk|az)|ilk|top) (?:[a-z]+ ){0,2}(\d{1,3})\b")
        .expect("top limit regex is valid")
});

static COUNT_LIMIT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{1,3}) (?:adet|tane)\b").expect("count limit regex is valid"));

static QUOTED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"["“”]([^"“”]{3,60})["“”]"#).expect("quoted phrase regex is valid")
});

// ============================================================================
// Dictionaries
// ============================================================================

const MONTH_NAMES: &[(&str, u32)] = &[
    ("ocak", 1),
    ("subat", 2),
    ("mart", 3),
    ("nisan", 4),
    ("mayis", 5),
    ("haziran", 6),
    ("temmuz", 7),
    ("agustos", 8),
    ("eylul", 9),
    ("ekim", 10),
    ("kasim", 11),
    ("aralik", 12),
];

const SEASON_FORMS: &[(&str, Season)] = &[
    ("kis", Season::Winter),
    ("kisin", Season::Winter),
    ("kislar", Season::Winter),
    ("yaz", Season::Summer),
    ("yazin", Season::Summer),
    ("yazda", Season::Summer),
    ("yazlar", Season::Summer),
    ("ilkbahar", Season::Spring),
    ("bahar", Season::Spring),
    ("sonbahar", Season::Autumn),
];

const VEHICLE_TYPE_FORMS: &[(&str, VehicleType)] = &[
    ("otobus", VehicleType::Bus),
    ("bus", VehicleType::Bus),
    ("kamyon", VehicleType::Truck),
    ("truck", VehicleType::Truck),
    ("minibus", VehicleType::Minibus),
];

const MANUFACTURER_FORMS: &[(&str, Manufacturer)] = &[
    ("man", Manufacturer::Man),
    ("mercedes", Manufacturer::Mercedes),
    ("benz", Manufacturer::Mercedes),
    ("iveco", Manufacturer::Iveco),
    ("ford", Manufacturer::Ford),
    ("temsa", Manufacturer::Temsa),
];

const CUSTOMER_CUES: &[&str] = &["musteri", "firma", "sirket"];
const SERVICE_CUES: &[&str] = &["servis", "lokasyon", "sube"];
const VEHICLE_CUES: &[&str] = &["plaka", "arac"];

pub(crate) const TOP_CUES: &[&str] = &[
    "en cok", "en fazla", "en sik", "en yuksek", "en dusuk", "en az", "ilk", "top", "sirala",
    "listele",
];

pub(crate) const COMPARISON_CUES: &[&str] = &[
    "karsilastir", "kiyasla", "compare", "fark", "arasinda", "vs", "versus",
];

/// Fixed noun pairs that read as one concept, never as two comparison sides.
const COMPOUND_CONCEPTS: &[&str] = &[
    "bakim ve onarim",
    "bakim onarim",
    "yuk ve yolcu",
    "yolcu ve yuk",
    "satis ve servis",
    "servis ve satis",
    "giris ve cikis",
    "cikis ve giris",
];

/// Curated part and consumable terms, including common inflected variants.
const MATERIAL_TERMS: &[&str] = &[
    // brakes
    "fren diski",
    "fren diskleri",
    "fren balatasi",
    "fren balatalari",
    "balata",
    "disk",
    "diski",
    "diskler",
    "kampana",
    "kaliper",
    // filters
    "hava filtresi",
    "yag filtresi",
    "yakit filtresi",
    "polen filtresi",
    "filtre",
    // fluids
    "motor yagi",
    "sanziman yagi",
    "yag",
    "yagi",
    "antifriz",
    "adblue",
    // electrics
    "aku",
    "akuler",
    "buji",
    "bujiler",
    "sensor",
    "far",
    "alternator",
    "mars motoru",
    // engine and drivetrain
    "debriyaj",
    "triger kayisi",
    "kayis",
    "rulman",
    "aks",
    "supap",
    "piston",
    "segman",
    "enjektor",
    "turbo",
    "egzoz",
    "radyator",
    "termostat",
    "devirdaim",
    // suspension and steering
    "amortisor",
    "rot",
    "rotil",
    "salincak",
    // other
    "lastik",
    "silecek",
    "ayna",
    "conta",
];

// ============================================================================
// Word Index
// ============================================================================

/// Words of the normalized text with their byte offsets, so regex spans can
/// be claimed at word granularity.
struct Words<'a> {
    text: &'a str,
    words: Vec<&'a str>,
    starts: Vec<usize>,
}

impl<'a> Words<'a> {
    fn new(text: &'a str) -> Self {
        let mut words = Vec::new();
        let mut starts = Vec::new();
        let mut offset = 0;
        for word in text.split(' ') {
            if !word.is_empty() {
                words.push(word);
                starts.push(offset);
            }
            offset += word.len() + 1;
        }
        Self { text, words, starts }
    }

    fn len(&self) -> usize {
        self.words.len()
    }

    fn claim(&self, claimed: &mut [bool], start: usize, end: usize) {
        for i in 0..self.words.len() {
            let word_start = self.starts[i];
            let word_end = word_start + self.words[i].len();
            if word_start < end && start < word_end {
                claimed[i] = true;
            }
        }
    }

    fn word_at(&self, byte: usize) -> Option<usize> {
        (0..self.words.len()).find(|&i| {
            let start = self.starts[i];
            byte >= start && byte < start + self.words[i].len()
        })
    }
}

// ============================================================================
// Extractor
// ============================================================================

pub struct EntityExtractor {
    min_year: i32,
    max_year: i32,
    max_top_limit: u32,
}

impl EntityExtractor {
    /// `reference_year` bounds plausible years: anything past next year is an
    /// identifier, not a date.
    pub fn new(min_year: i32, reference_year: i32, max_top_limit: u32) -> Self {
        Self {
            min_year,
            max_year: reference_year + 1,
            max_top_limit,
        }
    }

    /// Runs every sub-extractor over one question. Pure function of the
    /// input text; absence of an entity is an empty collection, never an
    /// error.
    pub fn extract(&self, raw: &str, text: &NormalizedText) -> EntityBag {
        let words = Words::new(&text.text);
        let mut claimed = vec![false; words.len()];
        let mut bag = EntityBag::default();

        self.extract_relative_window(&words, &mut claimed, &mut bag);
        self.extract_vehicle_models(&words, &mut claimed, &mut bag);
        self.extract_years(raw, &words, &mut claimed, &mut bag);
        self.extract_months(text, &words, &claimed, &mut bag);
        self.extract_identifiers(&words, &claimed, &mut bag);
        self.extract_service_codes(&words, &mut bag);
        self.extract_seasons(&text.tokens, &mut bag);
        self.extract_categorical_values(&text.tokens, &mut bag);
        self.extract_fault_codes(raw, &mut bag);
        self.extract_materials(raw, &text.text, &mut bag);
        self.extract_top_signal(text, &words, &claimed, &mut bag);
        self.extract_comparisons(raw, text, &mut bag);

        bag
    }

    // ------------------------------------------------------------------
    // Temporal
    // ------------------------------------------------------------------

    fn extract_relative_window(&self, words: &Words, claimed: &mut [bool], bag: &mut EntityBag) {
        let Some(caps) = RELATIVE_WINDOW_RE.captures(words.text) else {
            return;
        };
        let (Some(full), Some(value), Some(unit)) = (caps.get(0), caps.get(1), caps.get(2)) else {
            return;
        };
        let Ok(value) = value.as_str().parse::<u32>() else {
            return;
        };
        if value == 0 {
            return;
        }
        let unit = if unit.as_str() == "ay" {
            RelativeUnit::Month
        } else {
            RelativeUnit::Year
        };
        bag.relative_window = Some(RelativeWindow { unit, value });
        words.claim(claimed, full.start(), full.end());
    }

    fn extract_years(&self, raw: &str, words: &Words, claimed: &mut [bool], bag: &mut EntityBag) {
        for i in 0..words.len() {
            if claimed[i] {
                continue;
            }
            let word = words.words[i];
            let digit_len = word.chars().take_while(|c| c.is_ascii_digit()).count();
            if digit_len != 4 || !word[digit_len..].chars().all(|c| c.is_ascii_alphabetic()) {
                continue;
            }
            if let Ok(year) = word[..digit_len].parse::<i32>() {
                if (self.min_year..=self.max_year).contains(&year) {
                    bag.years.insert(year);
                    claimed[i] = true;
                }
            }
        }
        for caps in YEAR_SPAN_RE.captures_iter(raw) {
            self.expand_year_range(&caps[1], &caps[2], bag);
        }
        for caps in YEAR_PAIR_RE.captures_iter(words.text) {
            self.expand_year_range(&caps[1], &caps[2], bag);
        }
    }

    fn expand_year_range(&self, from: &str, to: &str, bag: &mut EntityBag) {
        let (Ok(from), Ok(to)) = (from.parse::<i32>(), to.parse::<i32>()) else {
            return;
        };
        if from <= to && self.min_year <= from && to <= self.max_year {
            for year in from..=to {
                bag.years.insert(year);
            }
        }
    }

    fn extract_months(
        &self,
        text: &NormalizedText,
        words: &Words,
        claimed: &[bool],
        bag: &mut EntityBag,
    ) {
        for token in &text.tokens {
            for (name, number) in MONTH_NAMES {
                if token_matches(token, name) {
                    bag.months.insert(*number);
                }
            }
        }
        for caps in MONTH_ORDINAL_RE.captures_iter(words.text) {
            let Some(digit) = caps.get(1) else { continue };
            if let Some(i) = words.word_at(digit.start()) {
                if claimed[i] {
                    continue;
                }
            }
            if let Ok(month) = digit.as_str().parse::<u32>() {
                bag.months.insert(month);
            }
        }
    }

    fn extract_seasons(&self, tokens: &[String], bag: &mut EntityBag) {
        let mut index = 0;
        while index < tokens.len() {
            // "son bahar" is the spaced spelling of sonbahar, not spring.
            if tokens[index] == "son"
                && tokens.get(index + 1).is_some_and(|next| category_match(next, "bahar"))
            {
                bag.seasons.insert(Season::Autumn);
                index += 2;
                continue;
            }
            for (form, season) in SEASON_FORMS {
                if category_match(&tokens[index], form) {
                    bag.seasons.insert(*season);
                }
            }
            index += 1;
        }
    }

    // ------------------------------------------------------------------
    // Identifiers
    // ------------------------------------------------------------------

    fn extract_identifiers(&self, words: &Words, claimed: &[bool], bag: &mut EntityBag) {
        for i in 0..words.len() {
            if claimed[i] {
                continue;
            }
            let word = words.words[i];
            let digit_len = word.chars().take_while(|c| c.is_ascii_digit()).count();
            if !(5..=6).contains(&digit_len)
                || !word[digit_len..].chars().all(|c| c.is_ascii_alphabetic())
            {
                continue;
            }
            let id = word[..digit_len].to_string();
            match identifier_class(words, i) {
                IdClass::Customer => bag.customer_ids.insert(id),
                IdClass::Service => bag.service_ids.insert(id),
                IdClass::Vehicle => bag.vehicle_ids.insert(id),
            };
        }
    }

    fn extract_vehicle_models(&self, words: &Words, claimed: &mut [bool], bag: &mut EntityBag) {
        let mut paired = false;
        for caps in MODEL_PAIR_RE.captures_iter(words.text) {
            let (Some(full), Some(base), Some(alt)) = (caps.get(0), caps.get(1), caps.get(2))
            else {
                continue;
            };
            paired = true;
            push_unique(&mut bag.vehicle_models, full.as_str().to_string());
            push_unique(&mut bag.vehicle_models, format!("rhc {}", base.as_str()));
            push_unique(&mut bag.vehicle_models, alt.as_str().to_string());
            words.claim(claimed, full.start(), full.end());
        }
        if paired {
            return;
        }
        for m in MODEL_SINGLE_RE.find_iter(words.text) {
            push_unique(&mut bag.vehicle_models, m.as_str().to_string());
            words.claim(claimed, m.start(), m.end());
        }
    }

    fn extract_service_codes(&self, words: &Words, bag: &mut EntityBag) {
        for caps in SERVICE_CODE_RE.captures_iter(words.text) {
            bag.service_ids.insert(format!("R{}", &caps[1]));
        }
    }

    // ------------------------------------------------------------------
    // Categorical
    // ------------------------------------------------------------------

    fn extract_categorical_values(&self, tokens: &[String], bag: &mut EntityBag) {
        for token in tokens {
            for (form, vehicle_type) in VEHICLE_TYPE_FORMS {
                if category_match(token, form) {
                    bag.vehicle_types.insert(*vehicle_type);
                }
            }
            for (form, manufacturer) in MANUFACTURER_FORMS {
                if category_match(token, form) {
                    bag.manufacturers.insert(*manufacturer);
                }
            }
        }
    }

    fn extract_fault_codes(&self, raw: &str, bag: &mut EntityBag) {
        for m in FAULT_CODE_RE.find_iter(raw) {
            if m.as_str().len() >= 4 {
                bag.fault_codes.insert(m.as_str().to_string());
            }
        }
    }

    fn extract_materials(&self, raw: &str, text: &str, bag: &mut EntityBag) {
        for caps in QUOTED_RE.captures_iter(raw) {
            let Some(span) = caps.get(1) else { continue };
            let keyword = normalize(span.as_str()).text;
            if keyword.len() > 2 {
                bag.material_keywords.insert(keyword);
            }
        }

        let matched: Vec<&str> = MATERIAL_TERMS
            .iter()
            .copied()
            .filter(|&term| material_term_present(text, term))
            .collect();
        for &term in &matched {
            let shadowed = matched
                .iter()
                .any(|&other| other != term && other.contains(term))
                || bag
                    .material_keywords
                    .iter()
                    .any(|quoted| quoted.as_str() != term && quoted.contains(term));
            if !shadowed {
                bag.material_keywords.insert(term.to_string());
            }
        }
    }

    // ------------------------------------------------------------------
    // Control signals
    // ------------------------------------------------------------------

    fn extract_top_signal(
        &self,
        text: &NormalizedText,
        words: &Words,
        claimed: &[bool],
        bag: &mut EntityBag,
    ) {
        if !has_any_phrase(&text.tokens, TOP_CUES) {
            return;
        }
        bag.has_top_signal = true;
        for pattern in [&TOP_LIMIT_RE, &COUNT_LIMIT_RE] {
            for caps in pattern.captures_iter(words.text) {
                let Some(number) = caps.get(1) else { continue };
                if let Some(i) = words.word_at(number.start()) {
                    if claimed[i] {
                        continue;
                    }
                }
                if let Ok(limit) = number.as_str().parse::<u32>() {
                    bag.top_limit = Some(limit.clamp(1, self.max_top_limit));
                    return;
                }
            }
        }
    }

    fn extract_comparisons(&self, raw: &str, text: &NormalizedText, bag: &mut EntityBag) {
        if COMPOUND_CONCEPTS.iter().any(|c| text.text.contains(c)) {
            return;
        }
        if !has_any_phrase(&text.tokens, COMPARISON_CUES) {
            return;
        }

        let raw_words: Vec<&str> = raw.split_whitespace().collect();
        let mut sides: Vec<String> = Vec::new();
        for i in 1..raw_words.len().saturating_sub(1) {
            let connector = normalize(raw_words[i]).text;
            if connector != "ve" && connector != "ile" {
                continue;
            }
            let left = comparison_candidate(raw_words[i - 1]);
            let right = comparison_candidate(raw_words[i + 1]);
            if let (Some(left), Some(right)) = (left, right) {
                if left != right {
                    push_unique(&mut sides, left);
                    push_unique(&mut sides, right);
                }
            }
        }
        if sides.len() >= 2 {
            bag.comparison_entities = sides;
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

enum IdClass {
    Vehicle,
    Customer,
    Service,
}

/// Classifies a numeric identifier by the nearest cue word, adjacent words
/// first. Bare plate-length numbers default to vehicle identifiers.
fn identifier_class(words: &Words, i: usize) -> IdClass {
    for offset in [-1i64, 1, -2, 2] {
        let j = i as i64 + offset;
        if j < 0 || j as usize >= words.len() {
            continue;
        }
        let neighbor = words.words[j as usize];
        if CUSTOMER_CUES.iter().any(|cue| token_matches(neighbor, cue)) {
            return IdClass::Customer;
        }
        if SERVICE_CUES.iter().any(|cue| token_matches(neighbor, cue)) {
            return IdClass::Service;
        }
        if VEHICLE_CUES.iter().any(|cue| token_matches(neighbor, cue)) {
            return IdClass::Vehicle;
        }
    }
    IdClass::Vehicle
}

/// Dictionary match: exact token, or prefix when the key is long enough to
/// rule out unrelated lexemes ("benzin" must not hit "benz", "kisa" must not
/// hit "kis").
fn category_match(token: &str, key: &str) -> bool {
    token == key || (key.len() >= 5 && token.starts_with(key))
}

/// Occurrence check with a word-start boundary. Short terms must also end at
/// a word boundary so unrelated words do not alias ("yagmur" is not "yag");
/// longer terms tolerate agglutinative suffixes.
fn material_term_present(text: &str, term: &str) -> bool {
    let bytes = text.as_bytes();
    let mut search = 0;
    while let Some(pos) = text[search..].find(term) {
        let at = search + pos;
        let end = at + term.len();
        let starts_word = at == 0 || bytes[at - 1] == b' ';
        let ends_word = end == text.len() || bytes[end] == b' ';
        if starts_word && (term.len() >= 5 || ends_word) {
            return true;
        }
        search = at + 1;
    }
    false
}

/// Whether a folded span resolves in any of the categorical dictionaries.
/// Spans that do not are preserved raw when they reach a filter.
pub(crate) fn resolves_in_dictionaries(folded: &str) -> bool {
    MANUFACTURER_FORMS.iter().any(|(form, _)| category_match(folded, form))
        || VEHICLE_TYPE_FORMS.iter().any(|(form, _)| category_match(folded, form))
        || SEASON_FORMS.iter().any(|(form, _)| category_match(folded, form))
        || SERVICE_CODE_RE.is_match(folded)
}

/// A word qualifies as a comparison operand when it resolves in one of the
/// categorical dictionaries or looks like a proper noun in the raw text.
/// Digits never qualify; numeric pairs are year ranges, not comparisons.
fn comparison_candidate(raw_word: &str) -> Option<String> {
    let trimmed = raw_word.trim_matches(|c: char| !c.is_alphanumeric());
    if trimmed.chars().count() < 2 {
        return None;
    }
    let folded = normalize(trimmed).text;
    if folded.len() < 2 || is_stop_word(&folded) {
        return None;
    }
    if folded.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let proper_noun = trimmed.chars().next().is_some_and(char::is_uppercase);
    if resolves_in_dictionaries(&folded) || proper_noun {
        Some(trimmed.to_string())
    } else {
        None
    }
}

fn push_unique(list: &mut Vec<String>, value: String) {
    if !list.contains(&value) {
        list.push(value);
    }
}
