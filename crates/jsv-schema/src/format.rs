//! # Format Assertions
//!
//! Checkers for the `format` values the compiler can assert when
//! [`CompilerOptions::assert_format`](crate::CompilerOptions) is set.
//! Unknown names have no checker and are ignored.

use std::net::{Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use url::Url;

/// Predicate over the string value of an instance.
pub type FormatCheck = fn(&str) -> bool;

/// Checker for the format `name`, if one is known.
pub fn checker(name: &str) -> Option<FormatCheck> {
    Some(match name {
        "date-time" => is_date_time,
        "date" => is_date,
        "time" => is_time,
        "email" => is_email,
        "hostname" => is_hostname,
        "ipv4" => is_ipv4,
        "ipv6" => is_ipv6,
        "uri" => is_uri,
        "uri-reference" => is_uri_reference,
        "regex" => is_regex,
        "json-pointer" => is_json_pointer,
        "uuid" => is_uuid,
        _ => return None,
    })
}

fn is_date_time(s: &str) -> bool {
    chrono::DateTime::parse_from_rfc3339(s).is_ok()
}

fn is_date(s: &str) -> bool {
    s.len() == 10 && chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
}

// RFC 3339 full-time: a partial time plus a mandatory offset.
fn is_time(s: &str) -> bool {
    chrono::DateTime::parse_from_rfc3339(&format!("1970-01-01T{s}")).is_ok()
}

fn is_email(s: &str) -> bool {
    match s.rsplit_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && local.len() <= 64
                && !local.starts_with('.')
                && !local.ends_with('.')
                && !local.contains("..")
                && is_hostname(domain)
        }
        None => false,
    }
}

fn is_hostname(s: &str) -> bool {
    let s = s.strip_suffix('.').unwrap_or(s);
    !s.is_empty()
        && s.len() <= 253
        && s.split('.').all(|label| {
            !label.is_empty()
                && label.len() <= 63
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        })
}

fn is_ipv4(s: &str) -> bool {
    Ipv4Addr::from_str(s).is_ok()
}

fn is_ipv6(s: &str) -> bool {
    Ipv6Addr::from_str(s).is_ok()
}

fn is_uri(s: &str) -> bool {
    Url::parse(s).is_ok()
}

fn is_uri_reference(s: &str) -> bool {
    if s.contains(char::is_whitespace) {
        return false;
    }
    Url::parse(s).is_ok()
        || Url::parse("http://uri-reference.invalid/")
            .and_then(|base| base.join(s))
            .is_ok()
}

fn is_regex(s: &str) -> bool {
    regex::Regex::new(s).is_ok()
}

fn is_json_pointer(s: &str) -> bool {
    if s.is_empty() {
        return true;
    }
    s.starts_with('/')
        && s[1..]
            .split('/')
            .all(|token| jsv_core::pointer::unescape(token).is_ok())
}

fn is_uuid(s: &str) -> bool {
    // Hyphenated form only.
    s.len() == 36 && uuid::Uuid::parse_str(s).is_ok()
}
