//! Text normalization ahead of learning: quotation markup is stripped, case is
//! folded, punctuation becomes ". " so the tokenizer sees sentence boundaries,
//! and noise words are dropped from the output as soon as they are complete.

use unicode_general_category::{GeneralCategory, get_general_category};

const OPEN_QUOTE: &str = "<quote";
const CLOSE_QUOTE: &str = "</quote>";

// Apostrophes and dashes are part of words
const KEPT_LITERALLY: [char; 5] = ['`', '\'', '’', '-', '–'];

pub fn normalize(text: &str, noise_words: &[String]) -> String {
    let mut out = String::with_capacity(text.len());
    let mut depth = 0usize;
    let mut rest = text;

    while let Some(c) = rest.chars().next() {
        if c == '<' {
            if let Some(after) = strip_open_tag(rest) {
                depth += 1;
                rest = after;
                continue;
            }
            if starts_with_ignore_case(rest, CLOSE_QUOTE) {
                rest = &rest[CLOSE_QUOTE.len()..];
                if depth > 0 {
                    depth -= 1;
                    if depth == 0 {
                        push(&mut out, '.', noise_words);
                    }
                }
                continue;
            }
        }
        rest = &rest[c.len_utf8()..];

        if KEPT_LITERALLY.contains(&c) {
            out.push(c);
        } else if is_punctuation(c) {
            push(&mut out, '.', noise_words);
            push(&mut out, ' ', noise_words);
        } else if c.is_whitespace() {
            if out.chars().next_back().is_some_and(|last| !last.is_whitespace()) {
                push(&mut out, ' ', noise_words);
            }
        } else if c == 'ё' || c == 'Ё' {
            out.push('е');
        } else if c.is_alphanumeric() {
            out.extend(c.to_lowercase());
        }
    }
    out
}

/// Punctuation in the Unicode sense (any `P*` general category: connectors,
/// dashes, brackets, quotes and other marks), as opposed to symbols such as
/// `+`, `$` or `<`.
pub fn is_punctuation(c: char) -> bool {
    matches!(
        get_general_category(c),
        GeneralCategory::ConnectorPunctuation
            | GeneralCategory::DashPunctuation
            | GeneralCategory::OpenPunctuation
            | GeneralCategory::ClosePunctuation
            | GeneralCategory::InitialPunctuation
            | GeneralCategory::FinalPunctuation
            | GeneralCategory::OtherPunctuation
    )
}

fn is_boundary(c: char) -> bool {
    c.is_whitespace() || is_punctuation(c)
}

// `<quote` followed by attributes up to the closing `>`
fn strip_open_tag(rest: &str) -> Option<&str> {
    if !starts_with_ignore_case(rest, OPEN_QUOTE) {
        return None;
    }
    let after = &rest[OPEN_QUOTE.len()..];
    match after.chars().next() {
        Some('>') => Some(&after[1..]),
        Some(c) if c.is_whitespace() => after.find('>').map(|end| &after[end + 1..]),
        _ => None,
    }
}

fn starts_with_ignore_case(s: &str, prefix: &str) -> bool {
    s.get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}

fn push(out: &mut String, c: char, noise_words: &[String]) {
    out.push(c);
    if is_boundary(c) {
        drop_trailing_noise_word(out, noise_words);
    }
}

// When the output ends in <boundary><noise word><boundary>, the first
// boundary and the word are removed and the closing boundary kept.
fn drop_trailing_noise_word(out: &mut String, noise_words: &[String]) {
    let Some(last) = out.chars().next_back() else {
        return;
    };
    let body = &out[..out.len() - last.len_utf8()];
    for word in noise_words.iter().filter(|w| !w.is_empty()) {
        let Some(before) = body.strip_suffix(word.as_str()) else {
            continue;
        };
        if let Some(b) = before.chars().next_back() {
            if is_boundary(b) {
                let cut = before.len() - b.len_utf8();
                out.truncate(cut);
                out.push(last);
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn quote_folds_into_sentence() {
        assert_eq!(
            normalize("<quote>inline remark</quote> end.", &[]),
            "inline remark. end. "
        );
    }

    #[test]
    fn quote_tags_with_attributes_and_nesting() {
        assert_eq!(
            normalize("a <Quote author=\"x\">b <quote>c</quote> d</QUOTE> e", &[]),
            "a b c d. e"
        );
        // a stray closing tag only disappears
        assert_eq!(normalize("x</quote>y", &[]), "xy");
        // other tags are not quote markup
        assert_eq!(normalize("<quotes>", &[]), "quotes");
    }

    #[test]
    fn punctuation_becomes_sentence_boundary() {
        assert_eq!(normalize("Hello, World!", &[]), "hello. world. ");
        assert_eq!(normalize("Так… вот", &[]), "так. вот");
    }

    #[test]
    fn punctuation_from_any_script_is_a_boundary() {
        assert_eq!(normalize("a，b。c！d", &[]), "a. b. c. d");
        assert_eq!(normalize("a،b", &[]), "a. b");
        assert_eq!(normalize("բառ։ բառ", &[]), "բառ. բառ");
        assert_eq!(normalize("x¿y", &[]), "x. y");
        assert!(!is_punctuation('$'));
        assert!(!is_punctuation('+'));
    }

    #[test]
    fn whitespace_collapses() {
        assert_eq!(normalize("  a \t\n b  ", &[]), "a b ");
    }

    #[test]
    fn yo_folds_to_ye() {
        assert_eq!(normalize("Ёлка ёж", &[]), "елка еж");
    }

    #[test]
    fn apostrophes_and_dashes_stay() {
        assert_eq!(normalize("Don't rock–n-roll", &[]), "don't rock–n-roll");
    }

    #[test]
    fn symbols_are_dropped() {
        assert_eq!(normalize("a+b=c $5", &[]), "abc 5");
    }

    #[test]
    fn noise_words_are_removed_between_boundaries() {
        let noise = words(&["the", "to"]);
        assert_eq!(normalize("Go to the store, the end", &noise), "go store. end");
        // words merely containing a noise word survive
        assert_eq!(normalize("x theory other y", &noise), "x theory other y");
        // nothing precedes a leading noise word, so it stays
        assert_eq!(normalize("the cat", &noise), "the cat");
    }
}
