//! Natural sorting and the roman-numeral order-affecting heuristic

use std::cmp::Ordering;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

/// Sort paths using natural (human-friendly) ordering
///
/// Examples:
/// - track1.mp3 < track2.mp3 < track10.mp3 (not track1, track10, track2)
/// - Chapter 1 < Chapter 2 < Chapter 10
pub fn natural_sort<P: AsRef<Path>>(paths: &mut [P]) {
    paths.sort_by(|a, b| natural_compare(a.as_ref(), b.as_ref()));
}

/// Compare two paths using natural ordering
fn natural_compare(a: &Path, b: &Path) -> Ordering {
    let a_str = a.to_string_lossy();
    let b_str = b.to_string_lossy();

    natord::compare(&a_str, &b_str)
}

/// Sort strings using natural ordering
pub fn natural_sort_strings(strings: &mut [String]) {
    strings.sort_by(|a, b| natord::compare(a, b));
}

fn roman_numeral_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^M{0,4}(CM|CD|D?C{0,3})(XC|XL|L?X{0,3})(IX|IV|V?I{0,3})$")
            .expect("static regex")
    })
}

/// Strip roman-numeral tokens from a filename. A whole word is treated as a
/// roman numeral if it fully matches the canonical numeral grammar; this is
/// a heuristic, not a dictionary check, so short English words that happen
/// to also be well-formed numerals (e.g. "MIX" = 1009, "LIVID" is not but
/// "DID" is not either since it needs D before I) will also be stripped.
fn strip_roman_numerals(name: &str) -> String {
    name.split_whitespace()
        .map(|word| {
            if is_roman_numeral_token(word) {
                String::new()
            } else {
                word.to_string()
            }
        })
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_roman_numeral_token(word: &str) -> bool {
    if word.is_empty() {
        return false;
    }
    let upper: String = word
        .chars()
        .map(|c| c.to_ascii_uppercase())
        .collect();
    if !upper.chars().all(|c| "MDCLXVI".contains(c)) {
        return false;
    }
    roman_numeral_regex().is_match(&upper)
}

/// Report whether filenames in a set contain distinct roman numerals in
/// positions where they affect sort order: true iff stripping the roman
/// numeral tokens from every filename produces a different natural-sort
/// order than keeping them.
pub fn roman_numerals_affect_order(filenames: &[String]) -> bool {
    let mut with_romans: Vec<String> = filenames.to_vec();
    let mut without_romans: Vec<String> = filenames.iter().map(|f| strip_roman_numerals(f)).collect();

    natural_sort_strings(&mut with_romans);
    natural_sort_strings(&mut without_romans);

    let stripped_original: Vec<String> = filenames.iter().map(|f| strip_roman_numerals(f)).collect();

    // Compare the relative order implied by each sort, not the strings
    // themselves (stripping changes the text, so we compare index
    // permutations against the original unsorted sequence).
    let mut indices_by_romans: Vec<usize> = (0..filenames.len()).collect();
    indices_by_romans.sort_by(|&a, &b| natord::compare(&filenames[a], &filenames[b]));

    let mut indices_by_stripped: Vec<usize> = (0..filenames.len()).collect();
    indices_by_stripped.sort_by(|&a, &b| natord::compare(&stripped_original[a], &stripped_original[b]));

    indices_by_romans != indices_by_stripped
}
