//! # Text Folding
//!
//! Case- and diacritics-insensitive comparison for catalog and disease
//! search. Cashiers type "dao on", "đạo ôn" or "ĐẠO ÔN" for the same thing.
//!
//! ```text
//!   "Đạo ôn lá"  ──fold──►  "dao on la"
//!   "VÀNG LÁ"    ──fold──►  "vang la"
//! ```
//!
//! Matching stays plain substring containment on the folded strings; there is
//! no tokenizing and no fuzzy distance.

/// Vowels and consonants with their diacritic forms, lowercase.
const FOLD_TABLE: &[(char, &str)] = &[
    ('a', "àáảãạăằắẳẵặâầấẩẫậäåā"),
    ('e', "èéẻẽẹêềếểễệëē"),
    ('i', "ìíỉĩịïī"),
    ('o', "òóỏõọôồốổỗộơờớởỡợöøō"),
    ('u', "ùúủũụưừứửữựüū"),
    ('y', "ỳýỷỹỵÿ"),
    ('d', "đ"),
    ('c', "ç"),
    ('n', "ñ"),
];

/// Combining diacritical marks block (decomposed input).
fn is_combining_mark(c: char) -> bool {
    ('\u{0300}'..='\u{036F}').contains(&c)
}

fn base_letter(c: char) -> char {
    if c.is_ascii() {
        return c;
    }
    FOLD_TABLE
        .iter()
        .find(|(_, variants)| variants.contains(c))
        .map(|(base, _)| *base)
        .unwrap_or(c)
}

/// Lowercases, strips diacritics and collapses runs of whitespace.
pub fn fold(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut last_space = true;
    for c in input.chars().flat_map(char::to_lowercase) {
        if is_combining_mark(c) {
            continue;
        }
        if c.is_whitespace() {
            if !last_space {
                out.push(' ');
                last_space = true;
            }
            continue;
        }
        out.push(base_letter(c));
        last_space = false;
    }
    if out.ends_with(' ') {
        out.pop();
    }
    out
}

/// True when `folded_needle` (already folded) occurs in `haystack`.
///
/// An empty needle never matches.
pub fn contains_folded(haystack: &str, folded_needle: &str) -> bool {
    !folded_needle.is_empty() && fold(haystack).contains(folded_needle)
}
