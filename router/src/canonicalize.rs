//! Pure request-path helpers: canonicalization, redirect URL building, and
//! the cache-bypass sniff. No I/O, no side effects.

use http::HeaderMap;
use http::header::CACHE_CONTROL;

/// Normalizes a raw request path into the canonical lookup key.
///
/// In order: lowercase, drop characters outside printable ASCII, collapse
/// slash runs, and resolve `.`/`..` segments against the root the way
/// filesystem path resolution does. Leading `..` segments that would escape
/// the root are dropped, not treated as an error. A trailing slash is
/// preserved. Idempotent.
pub fn canonicalize_path(raw: &str) -> String {
    let ascii: String = raw
        .to_lowercase()
        .chars()
        .filter(|c| (' '..='~').contains(c))
        .collect();

    let mut segments: Vec<&str> = Vec::new();
    for segment in ascii.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }

    let mut canonical = String::with_capacity(ascii.len() + 1);
    for segment in &segments {
        canonical.push('/');
        canonical.push_str(segment);
    }
    if canonical.is_empty() {
        return "/".to_string();
    }
    if ascii.ends_with('/') {
        canonical.push('/');
    }
    canonical
}

/// Appends the original query string to a redirect target, re-serialized
/// with keys in sorted order so the redirect is deterministic and cacheable.
pub fn redirect_url_with_query_string(url: &str, query: Option<&str>) -> String {
    let query = match query {
        Some(query) if !query.is_empty() => query,
        _ => return url.to_string(),
    };
    let mut pairs: Vec<(String, String)> = url::form_urlencoded::parse(query.as_bytes())
        .into_owned()
        .collect();
    pairs.sort_by(|a, b| a.0.cmp(&b.0));
    let encoded = url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs)
        .finish();
    format!("{url}?{encoded}")
}

/// True when the request carries a `Cache-Control: no-cache` directive; the
/// resolver is then asked to bypass its cache for this request only.
pub fn force_cache_invalidation(headers: &HeaderMap) -> bool {
    headers
        .get(CACHE_CONTROL)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.to_ascii_lowercase().contains("no-cache"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    #[test]
    fn test_lower() {
        assert_eq!(canonicalize_path("/TEST"), "/test");
    }

    #[test]
    fn test_slashes() {
        assert_eq!(canonicalize_path("//t//e///s/t"), "/t/e/s/t");
    }

    #[test]
    fn test_dots() {
        assert_eq!(
            canonicalize_path("./../this/./is/./only/../a/./test.html"),
            "/this/is/a/test.html"
        );
        assert_eq!(
            canonicalize_path("../this/./is/./only/../a/./test.html"),
            "/this/is/a/test.html"
        );
    }

    #[test]
    fn test_non_ascii() {
        assert_eq!(canonicalize_path("/te\u{a0}\u{2013}st"), "/test");
    }

    #[test]
    fn test_trailing_slash_preserved() {
        assert_eq!(canonicalize_path("/test/"), "/test/");
        assert_eq!(canonicalize_path("//TEST//"), "/test/");
    }

    #[test]
    fn test_root() {
        assert_eq!(canonicalize_path("/"), "/");
        assert_eq!(canonicalize_path("/../.."), "/");
    }

    #[test]
    fn test_combined() {
        assert_eq!(canonicalize_path("//TEST//./a/../b"), "/test/b");
    }

    #[test]
    fn test_idempotent() {
        for raw in ["//TEST//./a/../b", "/te\u{a0}\u{2013}st", "/a/b/../c/"] {
            let once = canonicalize_path(raw);
            assert_eq!(canonicalize_path(&once), once);
        }
    }

    #[test]
    fn test_query_string_missing() {
        let url = "http://example.com/test";
        assert_eq!(redirect_url_with_query_string(url, None), url);
        assert_eq!(redirect_url_with_query_string(url, Some("")), url);
    }

    #[test]
    fn test_query_string_sorted() {
        assert_eq!(
            redirect_url_with_query_string(
                "http://example.com/test",
                Some("string=true&show=off")
            ),
            "http://example.com/test?show=off&string=true"
        );
    }

    #[test]
    fn test_force_cache_invalidation() {
        let mut headers = HeaderMap::new();
        assert!(!force_cache_invalidation(&headers));
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("max-age=0"));
        assert!(!force_cache_invalidation(&headers));
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        assert!(force_cache_invalidation(&headers));
    }
}
