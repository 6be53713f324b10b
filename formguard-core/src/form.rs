//! Urlencoded form parsing and HTML attribute escaping

use crate::Error;
use serde::de::DeserializeOwned;
use std::collections::HashMap;

/// Parse URL-encoded form data
pub fn parse_form<T: DeserializeOwned>(body: &[u8]) -> Result<T, Error> {
    serde_urlencoded::from_bytes(body)
        .map_err(|e| Error::BadRequest(format!("Failed to parse form data: {}", e)))
}

/// Parse URL-encoded form data into a map. Repeated keys keep the first value.
pub fn parse_form_map(body: &[u8]) -> Result<HashMap<String, String>, Error> {
    let pairs: Vec<(String, String)> = parse_form(body)?;

    let mut map = HashMap::with_capacity(pairs.len());
    for (key, value) in pairs {
        map.entry(key).or_insert(value);
    }
    Ok(map)
}

/// Escape a string for use inside a double-quoted HTML attribute.
pub fn escape_attribute(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            c => out.push(c),
        }
    }
    out
}
