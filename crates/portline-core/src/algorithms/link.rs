//! # Links
//!
//! Short links wrap an issuer-minted bundle id. Fallback links carry the
//! whole bundle in the query string, so sharing works offline.

use crate::domain::{PortError, PortResult};
use serde_json::{Map, Value};
use url::Url;

/// A parsed shared link.
#[derive(Clone, Debug, PartialEq)]
pub enum ParsedLink {
    /// Issuer-minted id; resolve through the issuer.
    BundleId(String),
    /// Self-contained bundle JSON.
    Inline(Value),
}

/// Strip the legacy prefix older clients stored in front of bundle ids.
pub fn strip_legacy_prefix<'a>(bundle_id: &'a str, legacy_prefix: &str) -> &'a str {
    bundle_id.strip_prefix(legacy_prefix).unwrap_or(bundle_id)
}

/// Short link for a minted bundle id.
pub fn short_link(prefix: &str, bundle_id: &str) -> String {
    format!("{}{}", prefix, bundle_id)
}

/// Encode a bundle into a self-contained link.
pub fn bundle_to_fallback_link(prefix: &str, bundle: &Value) -> PortResult<String> {
    let obj = bundle
        .as_object()
        .ok_or_else(|| PortError::Validation("bundle is not a JSON object".to_string()))?;
    let pairs = obj.iter().map(|(key, value)| {
        let rendered = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        (key.clone(), rendered)
    });
    let url = Url::parse_with_params(prefix, pairs)
        .map_err(|e| PortError::Validation(format!("bad link prefix: {}", e)))?;
    Ok(url.to_string())
}

/// Decode a fallback link back into bundle JSON. All values come back as
/// strings, which is what every bundle field is.
pub fn fallback_link_to_bundle(link: &str) -> PortResult<Value> {
    let url = Url::parse(link).map_err(|e| PortError::Validation(format!("bad link: {}", e)))?;
    let mut obj = Map::new();
    for (key, value) in url.query_pairs() {
        obj.insert(key.into_owned(), Value::String(value.into_owned()));
    }
    if obj.is_empty() {
        return Err(PortError::Validation("link carries no bundle".to_string()));
    }
    Ok(Value::Object(obj))
}

/// Classify a shared link.
pub fn parse_link(link: &str, short_prefix: &str, fallback_prefix: &str) -> PortResult<ParsedLink> {
    if let Some(id) = link.strip_prefix(short_prefix) {
        let id = id.trim_matches('/');
        if id.is_empty() {
            return Err(PortError::Validation("short link has no bundle id".to_string()));
        }
        return Ok(ParsedLink::BundleId(id.to_string()));
    }
    if link.starts_with(fallback_prefix) {
        return fallback_link_to_bundle(link).map(ParsedLink::Inline);
    }
    Err(PortError::Validation(format!("unrecognised link {:?}", link)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SHORT: &str = "https://porting.me/link/";
    const FALLBACK: &str = "https://porting.me/bundle";

    #[test]
    fn test_legacy_prefix() {
        assert_eq!(strip_legacy_prefix("link://abc", "link://"), "abc");
        assert_eq!(strip_legacy_prefix("abc", "link://"), "abc");
    }

    #[test]
    fn test_fallback_link_preserves_fields() {
        let bundle = json!({
            "portId": "0123456789abcdef0123456789abcdef",
            "name": "Alice & Bob",
            "target": "direct",
        });
        let link = bundle_to_fallback_link(FALLBACK, &bundle).unwrap();
        assert!(link.starts_with(FALLBACK));
        assert_eq!(fallback_link_to_bundle(&link).unwrap(), bundle);
    }

    #[test]
    fn test_parse_link() {
        assert_eq!(
            parse_link(&short_link(SHORT, "xyz"), SHORT, FALLBACK).unwrap(),
            ParsedLink::BundleId("xyz".to_string())
        );
        let link = bundle_to_fallback_link(FALLBACK, &json!({"target": "group"})).unwrap();
        assert!(matches!(
            parse_link(&link, SHORT, FALLBACK).unwrap(),
            ParsedLink::Inline(_)
        ));
        assert!(parse_link("https://example.com", SHORT, FALLBACK).is_err());
        assert!(parse_link(SHORT, SHORT, FALLBACK).is_err());
    }
}
