//! Plain-text helpers shared by the scoring engine and metadata passes.

use crate::constants::REGEXPS;

/// Collapse runs of whitespace into single spaces.
pub fn normalize_whitespace(text: &str) -> String {
    REGEXPS.normalize.replace_all(text.trim(), " ").into_owned()
}

/// One-directional token-overlap similarity between two strings.
///
/// Both strings are tokenized on non-word boundaries and lower-cased.
/// The result is `1 - |tokens unique to B, joined|/|tokens of B, joined|`:
/// it measures how much of B is covered by A, so the arguments are not
/// interchangeable. Used for duplicate-header suppression (threshold 0.75)
/// and JSON-LD title disambiguation.
pub fn similarity(text_a: &str, text_b: &str) -> f64 {
    let a_lower = text_a.to_lowercase();
    let b_lower = text_b.to_lowercase();
    let tokens_a: Vec<&str> = REGEXPS
        .tokenize
        .split(&a_lower)
        .filter(|t| !t.is_empty())
        .collect();
    let tokens_b: Vec<&str> = REGEXPS
        .tokenize
        .split(&b_lower)
        .filter(|t| !t.is_empty())
        .collect();

    if tokens_a.is_empty() || tokens_b.is_empty() {
        return 0.0;
    }

    let unique_to_b: Vec<&str> = tokens_b
        .iter()
        .filter(|t| !tokens_a.contains(*t))
        .copied()
        .collect();

    let distance = unique_to_b.join(" ").len() as f64 / tokens_b.join(" ").len() as f64;
    1.0 - distance
}

/// Number of whitespace-separated words.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Decode the handful of named entities plus numeric character references
/// that survive attribute extraction.
pub fn unescape_html_entities(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];

        let semi = match rest.find(';') {
            // entity references are short; anything longer is literal text
            Some(i) if i <= 8 => i,
            _ => {
                out.push('&');
                rest = &rest[1..];
                continue;
            }
        };

        let entity = &rest[1..semi];
        let decoded = match entity {
            "quot" => Some('"'),
            "amp" => Some('&'),
            "apos" => Some('\''),
            "lt" => Some('<'),
            "gt" => Some('>'),
            _ => decode_numeric_entity(entity),
        };

        match decoded {
            Some(ch) => {
                out.push(ch);
                rest = &rest[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }

    out.push_str(rest);
    out
}

fn decode_numeric_entity(entity: &str) -> Option<char> {
    let digits = entity.strip_prefix('#')?;
    let code = if let Some(hex) = digits.strip_prefix('x').or_else(|| digits.strip_prefix('X')) {
        (1..=4).contains(&hex.len()).then_some(hex)?;
        u32::from_str_radix(hex, 16).ok()?
    } else {
        (1..=4).contains(&digits.len()).then_some(digits)?;
        digits.parse::<u32>().ok()?
    };
    char::from_u32(code)
}
