//! URL canonicalization
//!
//! The canonical form of a URL is the deduplication key for ingested items:
//! scheme/host case, default ports, duplicate slashes, query order and
//! fragments must not make the same resource look new.

use sha1::{Digest, Sha1};
use url::form_urlencoded;
use url::Url;

/// Normalize a URL into its canonical form.
///
/// Never fails: input that cannot be parsed (or has no host) is returned
/// trimmed, with the `https://` prefix applied when the input had no scheme.
pub fn normalize(raw: &str) -> String {
    let trimmed = raw.trim();

    if trimmed.is_empty() {
        return String::new();
    }

    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed.trim_start_matches('/'))
    };

    let parsed = match Url::parse(&candidate) {
        Ok(url) => url,
        Err(_) => return candidate,
    };

    let host = match parsed.host_str() {
        Some(host) if !host.is_empty() => host.to_lowercase(),
        _ => return candidate,
    };

    let scheme = parsed.scheme().to_lowercase();

    let mut normalized = format!("{}://{}", scheme, host);

    if let Some(port) = parsed.port() {
        if !is_default_port(&scheme, port) {
            normalized.push(':');
            normalized.push_str(&port.to_string());
        }
    }

    normalized.push_str(&normalize_path(parsed.path()));

    if let Some(query) = parsed.query().and_then(sorted_query) {
        normalized.push('?');
        normalized.push_str(&query);
    }

    normalized
}

/// Check whether a URL is an acceptable http(s) URL
pub fn is_valid(raw: &str) -> bool {
    let trimmed = raw.trim();

    if trimmed.is_empty() {
        return false;
    }

    if let Some(scheme) = explicit_scheme(trimmed) {
        if !is_web_scheme(scheme) {
            return false;
        }
    }

    let normalized = normalize(trimmed);

    match Url::parse(&normalized) {
        Ok(url) => is_web_scheme(url.scheme()) && url.host_str().is_some_and(|h| !h.is_empty()),
        Err(_) => false,
    }
}

/// Deduplication key for a canonical URL (lower-case hex SHA-1)
pub fn url_hash(canonical_url: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(canonical_url.as_bytes());
    hex::encode(hasher.finalize())
}

/// Leading `scheme:` token, with or without `//`; `host:port` is not a scheme
fn explicit_scheme(input: &str) -> Option<&str> {
    let (scheme, rest) = input.split_once(':')?;

    let mut chars = scheme.chars();
    let first = chars.next()?;
    if !first.is_ascii_alphabetic()
        || !chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '.' | '-'))
    {
        return None;
    }

    if !rest.starts_with("//") {
        let port = rest.split(['/', '?', '#']).next().unwrap_or_default();
        if !port.is_empty() && port.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
    }

    Some(scheme)
}

fn is_web_scheme(scheme: &str) -> bool {
    scheme.eq_ignore_ascii_case("http") || scheme.eq_ignore_ascii_case("https")
}

fn is_default_port(scheme: &str, port: u16) -> bool {
    matches!((scheme, port), ("http", 80) | ("https", 443))
}

/// Collapse slash runs, drop a trailing slash on non-root paths
fn normalize_path(path: &str) -> String {
    let mut collapsed = String::with_capacity(path.len() + 1);
    let mut previous_slash = false;

    for c in path.chars() {
        if c == '/' {
            if !previous_slash {
                collapsed.push(c);
            }
            previous_slash = true;
        } else {
            collapsed.push(c);
            previous_slash = false;
        }
    }

    if !collapsed.starts_with('/') {
        collapsed.insert(0, '/');
    }

    while collapsed.len() > 1 && collapsed.ends_with('/') {
        collapsed.pop();
    }

    collapsed
}

/// Stable sort of query pairs by key, re-encoded as form data
fn sorted_query(query: &str) -> Option<String> {
    let mut pairs: Vec<(String, String)> = form_urlencoded::parse(query.as_bytes())
        .filter(|(key, _)| !key.is_empty())
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    if pairs.is_empty() {
        return None;
    }

    pairs.sort_by(|a, b| a.0.cmp(&b.0));

    let encoded = form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs.iter())
        .finish();

    Some(encoded)
}
