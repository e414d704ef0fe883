// src/name.rs

//! Locale-aware matching of a verified name against a self-declared one.
//!
//! Matching is deliberately loose about ordering and diacritics but
//! strict about the set of name words: a missing or extra first name is
//! a mismatch, as is any genuinely different spelling.

/// Substitutions applied to declared names after uppercasing.
///
/// The table maps uppercase accented characters to their conventional
/// base transliteration. It is data, not logic: it is not exhaustive
/// over every diacritic form, and new pairs can be appended as they are
/// observed in real declarations. Note that `ß` needs no entry because
/// `str::to_uppercase` already expands it to `SS`.
const TRANSLITERATIONS: &[(char, &str)] = &[
    ('À', "A"),
    ('Á', "A"),
    ('Â', "A"),
    ('Ã', "A"),
    ('Å', "A"),
    ('Ā', "A"),
    ('Ă', "A"),
    ('Ą', "A"),
    ('Ä', "AE"),
    ('Æ', "AE"),
    ('Ç', "C"),
    ('Ć', "C"),
    ('Ĉ', "C"),
    ('Č', "C"),
    ('Ď', "D"),
    ('Đ', "D"),
    ('Ð', "D"),
    ('È', "E"),
    ('É', "E"),
    ('Ê', "E"),
    ('Ë', "E"),
    ('Ē', "E"),
    ('Ė', "E"),
    ('Ę', "E"),
    ('Ě', "E"),
    ('Ĝ', "G"),
    ('Ğ', "G"),
    ('Ġ', "G"),
    ('Ģ', "G"),
    ('Ì', "I"),
    ('Í', "I"),
    ('Î', "I"),
    ('Ï', "I"),
    ('Ĩ', "I"),
    ('Ī', "I"),
    ('Į', "I"),
    ('Ľ', "L"),
    ('Ļ', "L"),
    ('Ł', "L"),
    ('Ñ', "N"),
    ('Ń', "N"),
    ('Ņ', "N"),
    ('Ň', "N"),
    ('Ò', "O"),
    ('Ó', "O"),
    ('Ô', "O"),
    ('Õ', "O"),
    ('Ō', "O"),
    ('Ő', "O"),
    ('Ö', "OE"),
    ('Ø', "OE"),
    ('Œ', "OE"),
    ('Ŕ', "R"),
    ('Ř', "R"),
    ('Ś', "S"),
    ('Ŝ', "S"),
    ('Ş', "S"),
    ('Š', "S"),
    ('Ţ', "T"),
    ('Ť', "T"),
    ('Þ', "TH"),
    ('Ù', "U"),
    ('Ú', "U"),
    ('Û', "U"),
    ('Ũ', "U"),
    ('Ū', "U"),
    ('Ů', "U"),
    ('Ű', "U"),
    ('Ų', "U"),
    ('Ü', "UE"),
    ('Ŵ', "W"),
    ('Ý', "Y"),
    ('Ŷ', "Y"),
    ('Ÿ', "Y"),
    ('Ź', "Z"),
    ('Ż', "Z"),
    ('Ž', "Z"),
];

/// Replaces each mapped character in an already-uppercased string.
fn transliterate(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match TRANSLITERATIONS.iter().find(|(from, _)| *from == c) {
            Some((_, to)) => out.push_str(to),
            None => out.push(c),
        }
    }
    out
}

/// Compares a verified name (from the identity credential) against a
/// self-declared one.
///
/// An exact case-insensitive full-name match short-circuits. Otherwise
/// the declared names are transliterated, first names are compared as
/// order-independent word sets, and last names as whole strings.
pub fn match_name(
    verified_first_names: &str,
    verified_last_name: &str,
    declared_first_names: &str,
    declared_last_name: &str,
) -> bool {
    let verified_first = verified_first_names.to_uppercase();
    let verified_last = verified_last_name.to_uppercase();
    let declared_first = declared_first_names.to_uppercase();
    let declared_last = declared_last_name.to_uppercase();

    if verified_first == declared_first && verified_last == declared_last {
        return true;
    }

    let declared_first = transliterate(&declared_first);
    let declared_last = transliterate(&declared_last);

    let mut verified_words: Vec<&str> = verified_first.split_whitespace().collect();
    let mut declared_words: Vec<&str> = declared_first.split_whitespace().collect();
    verified_words.sort_unstable();
    declared_words.sort_unstable();

    verified_words == declared_words && verified_last == declared_last
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match_ignores_case() {
        assert!(match_name("A BEE", "SEA", "a bee", "sea"));
    }

    #[test]
    fn first_names_match_in_any_order() {
        assert!(match_name("A BEE", "SEA", "A Bee", "Sea"));
        assert!(match_name("A BEE", "SEA", "Bee A", "Sea"));
    }

    #[test]
    fn accented_declarations_match_after_transliteration() {
        assert!(match_name("A BEE", "SEA", "Ã Béë", "Sêâ"));
        assert!(match_name("MUELLER", "STRASSE", "Müller", "Straße"));
    }

    #[test]
    fn missing_first_name_does_not_match() {
        assert!(!match_name("A BEE", "SEA", "Bee", "Sea"));
    }

    #[test]
    fn extra_first_name_does_not_match() {
        assert!(!match_name("A BEE", "SEA", "A Bee Cee", "Sea"));
    }

    #[test]
    fn last_name_is_compared_whole_not_word_sorted() {
        assert!(!match_name("A", "DEL MAR", "A", "MAR DEL"));
    }

    #[test]
    fn different_spelling_does_not_match() {
        assert!(!match_name("A BEA", "SEA", "A Bee", "Sea"));
    }
}
