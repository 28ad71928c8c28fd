//! # JSON Pointer
//!
//! RFC 6901 helpers. Pointers are kept as escaped strings throughout the
//! workspace (`""` is the document root, `"/a/0"` a nested location);
//! tokens are unescaped only when they are used to index into a value.

use std::borrow::Cow;

use serde_json::Value;

use crate::error::CoreError;

/// Escape a single reference token (`~` becomes `~0`, `/` becomes `~1`).
pub fn escape(token: &str) -> Cow<'_, str> {
    if token.contains(['~', '/']) {
        Cow::Owned(token.replace('~', "~0").replace('/', "~1"))
    } else {
        Cow::Borrowed(token)
    }
}

/// Unescape a single reference token.
///
/// # Errors
///
/// Returns `CoreError::InvalidPointer` for a `~` not followed by `0` or `1`.
pub fn unescape(token: &str) -> Result<Cow<'_, str>, CoreError> {
    if !token.contains('~') {
        return Ok(Cow::Borrowed(token));
    }
    let mut out = String::with_capacity(token.len());
    let mut chars = token.chars();
    while let Some(c) = chars.next() {
        if c != '~' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('0') => out.push('~'),
            Some('1') => out.push('/'),
            other => {
                return Err(CoreError::InvalidPointer {
                    pointer: token.to_string(),
                    reason: match other {
                        Some(c) => format!("invalid escape sequence ~{c}"),
                        None => "dangling ~ at end of token".to_string(),
                    },
                })
            }
        }
    }
    Ok(Cow::Owned(out))
}

/// Append one unescaped token to `base`, escaping it.
pub fn push(base: &str, token: &str) -> String {
    format!("{base}/{}", escape(token))
}

/// Append an already-escaped relative pointer (`"allOf/0"`) to `base`.
///
/// An empty `relative` returns `base` unchanged.
pub fn append(base: &str, relative: &str) -> String {
    let relative = relative.trim_start_matches('/');
    if relative.is_empty() {
        base.to_string()
    } else {
        format!("{base}/{relative}")
    }
}

/// Resolve `pointer` against `root`.
///
/// Returns `None` when any token is missing, indexes past the end of an
/// array, or is not a valid escape sequence.
pub fn lookup<'v>(root: &'v Value, pointer: &str) -> Option<&'v Value> {
    if pointer.is_empty() {
        return Some(root);
    }
    let rest = pointer.strip_prefix('/')?;
    let mut current = root;
    for raw in rest.split('/') {
        let token = unescape(raw).ok()?;
        current = match current {
            Value::Object(map) => map.get(token.as_ref())?,
            Value::Array(items) => {
                // Leading zeros are not valid array indices.
                if token.len() > 1 && token.starts_with('0') {
                    return None;
                }
                items.get(token.parse::<usize>().ok()?)?
            }
            _ => return None,
        };
    }
    Some(current)
}

/// Whether `prefix` is `pointer` itself or one of its ancestors.
pub fn is_prefix(prefix: &str, pointer: &str) -> bool {
    pointer == prefix
        || (pointer.starts_with(prefix) && pointer.as_bytes().get(prefix.len()) == Some(&b'/'))
}
