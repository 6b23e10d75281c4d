// src/utils/cookie.rs

//! Cookie header assembly and parsing.
//!
//! The portal accepts its session as a flat `Cookie` header. The jar is kept
//! as a plain name/value map; serialization places a fixed set of well-known
//! cookie names first (session and WAF markers) because the portal's gateway
//! inspects them positionally.

use std::collections::BTreeMap;

/// Parse a `Cookie` header into name/value pairs.
///
/// Malformed segments without `=` are skipped.
pub fn parse_cookie_header(header: &str) -> BTreeMap<String, String> {
    let mut pairs = BTreeMap::new();
    for part in header.split(';') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        if let Some((name, value)) = part.split_once('=') {
            let name = name.trim();
            if !name.is_empty() {
                pairs.insert(name.to_string(), value.trim().to_string());
            }
        }
    }
    pairs
}

/// Extract the leading `name=value` pair from a `Set-Cookie` header value.
///
/// Attributes after the first `;` (Path, HttpOnly, ...) are dropped.
pub fn parse_set_cookie(header: &str) -> Option<(String, String)> {
    let first = header.split(';').next()?.trim();
    let (name, value) = first.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    Some((name.to_string(), value.trim().to_string()))
}

/// Build a `Cookie` header, emitting `preferred` names first in the given
/// order, followed by the remaining cookies.
pub fn build_cookie_header(pairs: &BTreeMap<String, String>, preferred: &[String]) -> String {
    let mut ordered = Vec::with_capacity(pairs.len());
    for name in preferred {
        if let Some(value) = pairs.get(name) {
            if !value.is_empty() {
                ordered.push(format!("{name}={value}"));
            }
        }
    }
    for (name, value) in pairs {
        if preferred.iter().any(|p| p == name) {
            continue;
        }
        ordered.push(format!("{name}={value}"));
    }
    ordered.join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jar(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_parse_cookie_header_pairs() {
        let parsed = parse_cookie_header("A=1; B=2; C=hello");
        assert_eq!(parsed["A"], "1");
        assert_eq!(parsed["B"], "2");
        assert_eq!(parsed["C"], "hello");
    }

    #[test]
    fn test_parse_cookie_header_skips_malformed() {
        let parsed = parse_cookie_header("A=1; nonsense; =empty; B=2");
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed["A"], "1");
        assert_eq!(parsed["B"], "2");
    }

    #[test]
    fn test_parse_set_cookie_drops_attributes() {
        assert_eq!(
            parse_set_cookie("SESSION=deadbeef; Path=/; HttpOnly"),
            Some(("SESSION".to_string(), "deadbeef".to_string()))
        );
        assert_eq!(parse_set_cookie("garbage"), None);
    }

    #[test]
    fn test_build_cookie_header_orders_preferred_keys() {
        let pairs = jar(&[("B", "2"), ("A", "1"), ("C", "3")]);
        let preferred = vec!["A".to_string(), "C".to_string()];
        assert_eq!(build_cookie_header(&pairs, &preferred), "A=1; C=3; B=2");
    }

    #[test]
    fn test_build_cookie_header_skips_missing_preferred() {
        let pairs = jar(&[("X", "9")]);
        let preferred = vec!["SESSION".to_string()];
        assert_eq!(build_cookie_header(&pairs, &preferred), "X=9");
    }
}
