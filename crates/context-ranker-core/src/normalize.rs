//! Text normalization and tokenization.
//!
//! The chunker windows over [`tokenize`], and both the index builder and
//! the ranker turn tokens into terms with the same [`stem`], so a query and
//! the chunk it should match always produce identical terms. Anything that
//! changes here changes recall on both sides at once.
//!
//! # Pipeline
//!
//! 1. Lower-case Latin letters.
//! 2. Drop Hebrew combining marks (niqqud and cantillation).
//! 3. Fold the five word-final letter forms onto their standard form.
//! 4. Replace every character that is not a Latin letter, ASCII digit,
//!    Hebrew letter, ZWJ or ZWNJ with a space.
//! 5. Split on whitespace and run [`stem`] on each token, dropping empties.
//!
//! # Example
//!
//! ```rust
//! use context_ranker_core::normalize::normalize;
//!
//! assert_eq!(normalize("Hello, World!"), vec!["hello", "world"]);
//! // final mem folds to regular mem, then the plural suffix is stripped
//! assert_eq!(normalize("ספרים"), vec!["ספר"]);
//! ```

const ZWNJ: char = '\u{200C}';
const ZWJ: char = '\u{200D}';

/// Word-final letter → standard form.
const FINAL_FORMS: [(char, char); 5] = [
    ('ך', 'כ'),
    ('ם', 'מ'),
    ('ן', 'נ'),
    ('ף', 'פ'),
    ('ץ', 'צ'),
];

/// Suffixes in the order they are tried; first match wins.
///
/// Written in standard letter form since final forms are folded before
/// stemming (`ים` is matched as `ימ`).
const SUFFIXES: [&str; 9] = ["ותיה", "יות", "יימ", "ימ", "ות", "יה", "יו", "נו", "ה"];

/// Single-letter prefixes (definite article and common prepositions).
const PREFIXES: [char; 6] = ['ה', 'ב', 'ל', 'מ', 'כ', 'ש'];

/// Minimum number of characters that must survive an affix strip.
const STEM_GUARD: usize = 2;

/// Normalize text into index terms.
///
/// Returns an empty vector for empty or punctuation-only input.
pub fn normalize(text: &str) -> Vec<String> {
    tokenize(text)
        .iter()
        .map(|t| stem(t))
        .filter(|t| !t.is_empty())
        .collect()
}

/// Steps 1–4 of the pipeline, split on whitespace. Tokens are not stemmed.
///
/// ```rust
/// use context_ranker_core::normalize::tokenize;
///
/// assert_eq!(tokenize("Hello, הַמֶּלֶךְ!"), vec!["hello", "המלכ"]);
/// assert!(tokenize("---- ....").is_empty());
/// ```
pub fn tokenize(text: &str) -> Vec<String> {
    clean(text).split_whitespace().map(String::from).collect()
}

/// Apply steps 1–4 of the pipeline, producing space-separated text.
fn clean(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if is_hebrew_mark(c) {
            continue;
        }
        if let Some(&(_, standard)) = FINAL_FORMS.iter().find(|(f, _)| *f == c) {
            out.push(standard);
        } else if is_hebrew_letter(c) || c.is_ascii_digit() || c == ZWJ || c == ZWNJ {
            out.push(c);
        } else if is_latin_letter(c) {
            out.extend(c.to_lowercase());
        } else {
            out.push(' ');
        }
    }
    out
}

/// Strip at most one suffix, then at most one prefix, from a token.
///
/// Each strip only happens when the token is longer than the affix
/// plus two characters, which keeps short words intact. This is a
/// heuristic affix stripper, not a morphological analyzer.
///
/// ```rust
/// use context_ranker_core::normalize::stem;
///
/// assert_eq!(stem("ספרימ"), "ספר");
/// assert_eq!(stem("הבית"), "בית");
/// assert_eq!(stem("בית"), "בית");
/// ```
pub fn stem(token: &str) -> String {
    let mut word = token.to_string();

    for suffix in SUFFIXES {
        let suffix_len = suffix.chars().count();
        if word.ends_with(suffix) && word.chars().count() > suffix_len + STEM_GUARD {
            word.truncate(word.len() - suffix.len());
            break;
        }
    }

    for prefix in PREFIXES {
        if word.starts_with(prefix) && word.chars().count() > 1 + STEM_GUARD {
            word = word[prefix.len_utf8()..].to_string();
            break;
        }
    }

    word
}

fn is_hebrew_mark(c: char) -> bool {
    matches!(
        c,
        '\u{0591}'..='\u{05BD}'
            | '\u{05BF}'
            | '\u{05C1}'..='\u{05C2}'
            | '\u{05C4}'..='\u{05C5}'
            | '\u{05C7}'
    )
}

fn is_hebrew_letter(c: char) -> bool {
    ('\u{05D0}'..='\u{05EA}').contains(&c)
}

fn is_latin_letter(c: char) -> bool {
    c.is_ascii_alphabetic() || (('\u{00C0}'..='\u{024F}').contains(&c) && c.is_alphabetic())
}
