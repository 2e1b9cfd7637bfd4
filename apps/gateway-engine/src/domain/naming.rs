//! Field-name conversion for vendor records.
//!
//! Vendor contract records arrive as camelCase field maps. They are renamed
//! here, in one place, before typed deserialization.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

#[allow(clippy::expect_used)]
static WORD_BOUNDARY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("(.)([A-Z][a-z]+)").expect("static pattern is valid"));

#[allow(clippy::expect_used)]
static LOWER_UPPER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("([a-z0-9])([A-Z])").expect("static pattern is valid"));

/// Convert a camelCase (or PascalCase) identifier to snake_case.
///
/// ```
/// use gateway_engine::domain::naming::camel_to_snake;
///
/// assert_eq!(camel_to_snake("primaryExchange"), "primary_exchange");
/// assert_eq!(camel_to_snake("XMLHttpRequest"), "xml_http_request");
/// ```
#[must_use]
pub fn camel_to_snake(name: &str) -> String {
    let words = WORD_BOUNDARY.replace_all(name, "${1}_${2}");
    LOWER_UPPER
        .replace_all(&words, "${1}_${2}")
        .to_lowercase()
}

/// Rename every public key of a vendor record to snake_case.
///
/// Keys starting with `_` are private vendor state and are dropped.
#[must_use]
pub fn snake_case_keys(record: Map<String, Value>) -> Map<String, Value> {
    record
        .into_iter()
        .filter(|(key, _)| !key.starts_with('_'))
        .map(|(key, value)| (camel_to_snake(&key), value))
        .collect()
}
