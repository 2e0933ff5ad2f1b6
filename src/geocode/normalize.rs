//! Address clean-up before querying providers.

use regex::Regex;
use std::sync::LazyLock;

static STREET_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bul\b\.?").expect("valid regex"));
static FLAT_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\blok\b\.?\s*\S+").expect("valid regex"));
static PAVILION_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bpaw\b\.?\s*\S+").expect("valid regex"));
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));
static HOUSE_NUMBER_TAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+\d+.*$").expect("valid regex"));

/// Strip street prefix, flat and pavilion markers, then transliterate to ASCII
pub fn normalize_address(addr: &str) -> String {
    let a = STREET_PREFIX.replace_all(addr.trim(), "");
    let a = FLAT_MARKER.replace_all(&a, "");
    let a = PAVILION_MARKER.replace_all(&a, "");
    let a = WHITESPACE.replace_all(&a, " ");

    deunicode::deunicode(&a)
        .trim_matches(|c: char| c == ',' || c.is_whitespace())
        .to_string()
}

/// Drop the house number and everything after it
pub fn street_only(addr: &str) -> String {
    HOUSE_NUMBER_TAIL.replace(addr, "").trim().to_string()
}

/// Full provider query: normalized address plus city hint
pub fn build_query(addr: &str, city_hint: &str) -> String {
    let normalized = normalize_address(addr);
    if city_hint.is_empty() {
        normalized
    } else {
        format!("{}, {}", normalized, city_hint)
    }
}
