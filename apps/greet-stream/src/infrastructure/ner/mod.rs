//! Rule-Based Entity Tagger
//!
//! A small, dependency-free `EntityExtractor` that finds runs of
//! capitalized words and labels them from a built-in gazetteer.
//!
//! # Pipeline
//!
//! 1. Validate: size limit, no non-whitespace control characters
//! 2. Tokenize into words and punctuation with byte spans, tracking
//!    sentence starts (`Dr.`-style titles do not end a sentence)
//! 3. Chunk runs of capitalized words, bridging `of`/`de`/`van`/`von`/`del`
//! 4. Trim sentence-initial function words, drop unknown one-word
//!    sentence openers, strip possessive `'s`
//! 5. Label: `ORGANIZATION`, `GPE`, `PERSON`, otherwise `MISC`

use crate::ExtractionSettings;
use crate::application::ports::EntityExtractor;
use crate::domain::extraction::{Entity, ExtractionError};

// =============================================================================
// Labels and Gazetteer
// =============================================================================

const PERSON: &str = "PERSON";
const GPE: &str = "GPE";
const ORGANIZATION: &str = "ORGANIZATION";
const MISC: &str = "MISC";

/// Lowercase words that may sit between two capitalized words of a name.
const CONNECTORS: &[&str] = &["of", "de", "van", "von", "del", "da"];

/// Capitalized only because they open a sentence.
const FUNCTION_WORDS: &[&str] = &[
    "A", "An", "The", "This", "That", "These", "Those", "It", "Its", "He", "She", "We", "They",
    "You", "I", "My", "Our", "His", "Her", "Their", "In", "On", "At", "By", "For", "From", "To",
    "With", "But", "And", "Or", "If", "When", "While", "After", "Before", "Yesterday", "Today",
    "Tomorrow", "No", "Yes", "Hello", "Hi", "Thanks", "There", "Here", "What", "Who", "Why",
    "How", "Where", "Some", "Many", "All", "Every", "Last", "Next",
];

const TITLES: &[&str] = &[
    "Mr", "Mrs", "Ms", "Dr", "Prof", "Sir", "Dame", "President", "Senator", "Judge",
];

const GIVEN_NAMES: &[&str] = &[
    "Ada", "Alan", "Albert", "Alice", "Angela", "Barack", "Barbara", "Bill", "Charles",
    "Donald", "Elizabeth", "Emma", "George", "Grace", "Isaac", "James", "John", "Joe",
    "Kamala", "Linus", "Margaret", "Maria", "Marie", "Mary", "Michelle", "Nelson", "Steve",
    "Taylor", "Tim", "Vladimir", "William",
];

const PLACES: &[&str] = &[
    "Africa", "America", "Asia", "Australia", "Beijing", "Berlin", "Boston", "Brazil",
    "California", "Canada", "Chicago", "China", "Egypt", "England", "Europe", "France",
    "Geneva", "Germany", "India", "Ireland", "Italy", "Japan", "Kenya", "London",
    "Los Angeles", "Madrid", "Mexico", "Moscow", "New York", "Paris", "Rome", "Russia",
    "San Francisco", "Scotland", "Spain", "Sydney", "Texas", "Tokyo", "United Kingdom",
    "United States", "Washington",
];

const PLACE_SUFFIXES: &[&str] = &["City", "County", "Island", "Islands", "Republic", "Kingdom"];

const ORG_SUFFIXES: &[&str] = &[
    "Agency", "Association", "Bank", "Co", "Committee", "Company", "Corp", "Corporation",
    "Council", "Foundation", "Group", "Inc", "Institute", "LLC", "Ltd", "Nations", "Party",
    "Society", "Union", "University",
];

const ORG_PREFIXES: &[&str] = &["Bank", "Department", "Ministry", "University", "Institute"];

// =============================================================================
// Extractor
// =============================================================================

/// Configuration for the rule-based tagger.
#[derive(Debug, Clone, Copy)]
pub struct ExtractorConfig {
    /// Largest accepted input in bytes.
    pub max_input_bytes: usize,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            max_input_bytes: 64 * 1024,
        }
    }
}

impl From<ExtractionSettings> for ExtractorConfig {
    fn from(settings: ExtractionSettings) -> Self {
        Self {
            max_input_bytes: settings.max_input_bytes,
        }
    }
}

/// Gazetteer-backed capitalized-run tagger.
#[derive(Debug, Clone, Default)]
pub struct HeuristicExtractor {
    config: ExtractorConfig,
}

impl HeuristicExtractor {
    /// Create a tagger with the given configuration.
    #[must_use]
    pub const fn new(config: ExtractorConfig) -> Self {
        Self { config }
    }

    fn validate(&self, text: &str) -> Result<(), ExtractionError> {
        if text.len() > self.config.max_input_bytes {
            return Err(ExtractionError::InputTooLarge {
                len: text.len(),
                max: self.config.max_input_bytes,
            });
        }
        if let Some((offset, _)) = text
            .char_indices()
            .find(|(_, c)| c.is_control() && !c.is_whitespace())
        {
            return Err(ExtractionError::Unparseable { offset });
        }
        Ok(())
    }
}

impl EntityExtractor for HeuristicExtractor {
    fn extract(&self, text: &str) -> Result<Vec<Entity>, ExtractionError> {
        self.validate(text)?;
        let tokens = tokenize(text);
        Ok(chunk(text, &tokens))
    }
}

// =============================================================================
// Tokenizer
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenKind {
    Word,
    Punct,
}

#[derive(Debug, Clone, Copy)]
struct Token {
    start: usize,
    end: usize,
    kind: TokenKind,
    sentence_start: bool,
}

impl Token {
    fn text<'a>(&self, source: &'a str) -> &'a str {
        &source[self.start..self.end]
    }

    fn is_capitalized(&self, source: &str) -> bool {
        self.kind == TokenKind::Word
            && self
                .text(source)
                .chars()
                .next()
                .is_some_and(char::is_uppercase)
    }
}

/// Apostrophes, hyphens and inner dots join word characters (`O'Neil`,
/// `Jean-Luc`, `U.S`).
const fn is_joiner(c: char) -> bool {
    matches!(c, '\'' | '\u{2019}' | '-' | '.' | '&')
}

fn tokenize(text: &str) -> Vec<Token> {
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let mut tokens = Vec::new();
    let mut sentence_start = true;
    let mut i = 0;

    while i < chars.len() {
        let (start, c) = chars[i];

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        if c.is_alphanumeric() {
            let mut j = i + 1;
            while j < chars.len() {
                let next = chars[j].1;
                if next.is_alphanumeric() {
                    j += 1;
                } else if is_joiner(next)
                    && chars.get(j + 1).is_some_and(|(_, after)| after.is_alphanumeric())
                {
                    j += 2;
                } else {
                    break;
                }
            }
            let end = chars.get(j).map_or(text.len(), |(offset, _)| *offset);
            tokens.push(Token {
                start,
                end,
                kind: TokenKind::Word,
                sentence_start,
            });
            sentence_start = false;
            i = j;
            continue;
        }

        let ends_sentence = matches!(c, '.' | '!' | '?')
            && !tokens.last().is_some_and(|prev: &Token| {
                prev.kind == TokenKind::Word && TITLES.contains(&prev.text(text))
            });
        tokens.push(Token {
            start,
            end: start + c.len_utf8(),
            kind: TokenKind::Punct,
            sentence_start: false,
        });
        if ends_sentence {
            sentence_start = true;
        }
        i += 1;
    }

    tokens
}

// =============================================================================
// Chunker
// =============================================================================

fn chunk(text: &str, tokens: &[Token]) -> Vec<Entity> {
    let mut entities = Vec::new();
    let mut after_title = false;
    let mut k = 0;

    while k < tokens.len() {
        if !tokens[k].is_capitalized(text) {
            if tokens[k].kind == TokenKind::Word {
                after_title = false;
            }
            k += 1;
            continue;
        }

        let mut last = k;
        let mut m = k + 1;
        loop {
            if m < tokens.len() && tokens[m].is_capitalized(text) {
                last = m;
                m += 1;
            } else if m + 1 < tokens.len()
                && tokens[m].kind == TokenKind::Word
                && CONNECTORS.contains(&tokens[m].text(text))
                && tokens[m + 1].is_capitalized(text)
            {
                last = m + 1;
                m += 2;
            } else {
                break;
            }
        }

        let run = &tokens[k..=last];
        k = last + 1;

        if run.len() == 1 && TITLES.contains(&run[0].text(text)) {
            after_title = true;
            continue;
        }

        if let Some(entity) = classify(text, run, after_title) {
            entities.push(entity);
        }
        after_title = false;
    }

    entities
}

fn classify(text: &str, run: &[Token], after_title: bool) -> Option<Entity> {
    let mut run = run;

    if run[0].sentence_start {
        while let Some(first) = run.first() {
            if FUNCTION_WORDS.contains(&first.text(text)) {
                run = &run[1..];
            } else {
                break;
            }
        }
    }
    let (first, last) = (run.first()?, run.last()?);

    // The pronoun is capitalized everywhere.
    if run.len() == 1 && first.text(text) == "I" {
        return None;
    }

    let mut end = last.end;
    for suffix in ["'s", "\u{2019}s"] {
        if text[first.start..end].ends_with(suffix) {
            end -= suffix.len();
            break;
        }
    }
    let span = &text[first.start..end];
    let words: Vec<&str> = span.split_whitespace().collect();

    if run.len() == 1 && first.sentence_start && !after_title && !is_known(span) {
        return None;
    }

    Some(Entity::new(span, label(span, &words, after_title)))
}

fn is_known(word: &str) -> bool {
    PLACES.contains(&word) || GIVEN_NAMES.contains(&word) || ORG_SUFFIXES.contains(&word)
}

fn label(span: &str, words: &[&str], after_title: bool) -> &'static str {
    let first = words.first().copied().unwrap_or_default();
    let last = words.last().copied().unwrap_or_default();

    if words.len() > 1 && (ORG_SUFFIXES.contains(&last) || ORG_PREFIXES.contains(&first)) {
        ORGANIZATION
    } else if after_title {
        PERSON
    } else if PLACES.contains(&span) || (words.len() > 1 && PLACE_SUFFIXES.contains(&last)) {
        GPE
    } else if GIVEN_NAMES.contains(&first) || words.len() > 1 {
        PERSON
    } else {
        MISC
    }
}

// =============================================================================
// Tests
// =============================================================================
