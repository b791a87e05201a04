// Character classification and single-character case folding.

/// Returns true if the character is an uppercase letter.
pub fn is_upper(c: char) -> bool {
    c.is_uppercase()
}

/// Returns true if the character is a lowercase letter.
pub fn is_lower(c: char) -> bool {
    c.is_lowercase()
}

/// Lowercase a single character, keeping it unchanged when the mapping
/// is not one-to-one (e.g. 'İ'). Multi-character expansions would change
/// the symbol count seen by the transducer, so they are rejected here.
pub fn to_lower(c: char) -> char {
    let mut it = c.to_lowercase();
    match (it.next(), it.next()) {
        (Some(l), None) => l,
        _ => c,
    }
}

/// Uppercase a single character, keeping it unchanged when the mapping
/// is not one-to-one (e.g. 'ß').
pub fn to_upper(c: char) -> char {
    let mut it = c.to_uppercase();
    match (it.next(), it.next()) {
        (Some(u), None) => u,
        _ => c,
    }
}

/// Returns true if the character counts as whitespace for tokenization.
pub fn is_space(c: char) -> bool {
    c.is_whitespace()
}

/// Returns true if the character counts as punctuation for the drivers
/// that gate matching on punctuation (TM analysis, transliteration).
///
/// Printable, non-alphanumeric, non-whitespace characters qualify, which
/// covers both ASCII punctuation and the Unicode punctuation blocks.
pub fn is_punct(c: char) -> bool {
    !c.is_alphanumeric() && !c.is_whitespace() && !c.is_control()
}

/// Returns true if the character is a letter or digit.
pub fn is_alnum(c: char) -> bool {
    c.is_alphanumeric()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn case_tests() {
        assert!(is_upper('A'));
        assert!(is_upper('\u{00C4}')); // Ä
        assert!(!is_upper('a'));
        assert!(is_lower('a'));
        assert!(is_lower('\u{00F6}')); // ö
        assert!(!is_lower('9'));
    }

    #[test]
    fn fold_simple() {
        assert_eq!(to_lower('A'), 'a');
        assert_eq!(to_lower('\u{00C4}'), '\u{00E4}');
        assert_eq!(to_upper('a'), 'A');
        assert_eq!(to_upper('\u{00F6}'), '\u{00D6}');
    }

    #[test]
    fn fold_keeps_non_letters() {
        assert_eq!(to_lower('3'), '3');
        assert_eq!(to_upper('-'), '-');
    }

    #[test]
    fn fold_rejects_expanding_mappings() {
        // 'ß' uppercases to "SS"; the symbol count must not change.
        assert_eq!(to_upper('\u{00DF}'), '\u{00DF}');
    }

    #[test]
    fn punctuation() {
        assert!(is_punct('.'));
        assert!(is_punct('\u{00BF}')); // ¿
        assert!(!is_punct('a'));
        assert!(!is_punct(' '));
        assert!(!is_punct('7'));
    }

    #[test]
    fn whitespace() {
        assert!(is_space(' '));
        assert!(is_space('\t'));
        assert!(is_space('\u{00A0}'));
        assert!(!is_space('x'));
    }
}
