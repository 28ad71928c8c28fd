//! # URI Helpers
//!
//! `$ref` and `$id` values are URI references. Resolution against a base
//! uses [`url::Url::join`]; this module covers the pieces `url` leaves to
//! the caller: splitting off the fragment and percent-decoding it so it can
//! be used as a JSON pointer or anchor name.

use url::Url;

use crate::error::CoreError;

/// Split a reference into the part before `#` and the fragment, if any.
pub fn split_fragment(reference: &str) -> (&str, Option<&str>) {
    match reference.split_once('#') {
        Some((base, fragment)) => (base, Some(fragment)),
        None => (reference, None),
    }
}

/// Percent-decode a URI fragment.
///
/// # Errors
///
/// Returns `CoreError::InvalidUrl` for truncated or non-hex escapes and for
/// byte sequences that are not UTF-8.
pub fn percent_decode(input: &str) -> Result<String, CoreError> {
    if !input.contains('%') {
        return Ok(input.to_string());
    }
    let invalid = |reason: &str| CoreError::InvalidUrl {
        url: input.to_string(),
        reason: reason.to_string(),
    };
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = bytes
                .get(i + 1..i + 3)
                .ok_or_else(|| invalid("truncated percent escape"))?;
            let hex = std::str::from_utf8(hex).map_err(|_| invalid("non-ascii percent escape"))?;
            let byte =
                u8::from_str_radix(hex, 16).map_err(|_| invalid("non-hex percent escape"))?;
            out.push(byte);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).map_err(|_| invalid("percent escapes do not decode to utf-8"))
}

/// Parse an absolute URL.
///
/// # Errors
///
/// Returns `CoreError::InvalidUrl` when `input` is not an absolute URL.
pub fn parse_absolute(input: &str) -> Result<Url, CoreError> {
    Url::parse(input).map_err(|e| CoreError::InvalidUrl {
        url: input.to_string(),
        reason: e.to_string(),
    })
}

/// Resolve `reference` against `base`.
///
/// # Errors
///
/// Returns `CoreError::InvalidUrl` when the join fails, e.g. a relative path
/// against a `urn:` base.
pub fn resolve(base: &Url, reference: &str) -> Result<Url, CoreError> {
    base.join(reference).map_err(|e| CoreError::InvalidUrl {
        url: reference.to_string(),
        reason: format!("cannot resolve against {base}: {e}"),
    })
}

/// A copy of `url` with its fragment removed.
pub fn without_fragment(url: &Url) -> Url {
    let mut url = url.clone();
    url.set_fragment(None);
    url
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_fragment() {
        assert_eq!(split_fragment("a.json#/x"), ("a.json", Some("/x")));
        assert_eq!(split_fragment("#foo"), ("", Some("foo")));
        assert_eq!(split_fragment("a.json"), ("a.json", None));
    }

    #[test]
    fn test_percent_decode() {
        assert_eq!(percent_decode("/a%20b").unwrap(), "/a b");
        assert_eq!(percent_decode("/%25").unwrap(), "/%");
        assert!(percent_decode("/%2").is_err());
        assert!(percent_decode("/%zz").is_err());
    }

    #[test]
    fn test_resolve_relative_reference() {
        let base = parse_absolute("http://example.com/schemas/root.json").unwrap();
        let joined = resolve(&base, "other.json#/$defs/a").unwrap();
        assert_eq!(joined.as_str(), "http://example.com/schemas/other.json#/$defs/a");
        assert_eq!(
            without_fragment(&joined).as_str(),
            "http://example.com/schemas/other.json"
        );
    }

    #[test]
    fn test_resolve_fragment_against_urn() {
        let base = parse_absolute("urn:example:root").unwrap();
        let joined = resolve(&base, "#node").unwrap();
        assert_eq!(joined.fragment(), Some("node"));
    }
}
