//! Path classification and segment splitting.

use std::borrow::Cow;

use percent_encoding::percent_decode_str;

/// Returns `true` if `path` contains a parameter (`:`) or wildcard (`*`) token.
///
/// Only route *templates* are classified, at registration time. A request path
/// is never classified: it always checks the static table before the trie.
///
/// # Examples
///
/// ```
/// use rapidroute::router::is_dynamic;
///
/// assert!(is_dynamic("/users/:id"));
/// assert!(is_dynamic("/static/*filepath"));
/// assert!(!is_dynamic("/about"));
/// ```
pub fn is_dynamic(path: &str) -> bool {
    path.contains([':', '*'])
}

/// Splits `path` on `/`, skipping the empty segments produced by leading,
/// trailing, or repeated slashes.
pub(crate) fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

/// Percent-decodes one request path segment (or a whole static path).
///
/// Request paths are split first and decoded second, so an encoded `%2F`
/// stays inside its segment. Invalid UTF-8 is replaced, not rejected.
pub(crate) fn decode(raw: &str) -> Cow<'_, str> {
    percent_decode_str(raw).decode_utf8_lossy()
}

/// Returns the capture name if `segment` is a parameter (`:name`) or wildcard
/// (`*name`) segment.
///
/// Both forms capture exactly one segment. The returned name may be empty for
/// a bare `:` or `*`; registration rejects that case.
pub(crate) fn capture_name(segment: &str) -> Option<&str> {
    segment
        .strip_prefix(':')
        .or_else(|| segment.strip_prefix('*'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_by_token_anywhere() {
        assert!(is_dynamic(":id"));
        assert!(is_dynamic("/a/b:c"));
        assert!(is_dynamic("/files/*"));
        assert!(!is_dynamic("/"));
        assert!(!is_dynamic(""));
        assert!(!is_dynamic("/users/profile"));
    }

    #[test]
    fn segments_skip_empty() {
        let segs: Vec<_> = segments("//users///42/").collect();
        assert_eq!(segs, vec!["users", "42"]);
        assert_eq!(segments("/").count(), 0);
    }

    #[test]
    fn decodes_percent_escapes() {
        assert_eq!(decode("john%20doe"), "john doe");
        assert_eq!(decode("a%2Fb"), "a/b");
        assert_eq!(decode("caf%C3%A9"), "café");
        assert!(matches!(decode("plain"), Cow::Borrowed("plain")));
    }

    #[test]
    fn capture_names() {
        assert_eq!(capture_name(":id"), Some("id"));
        assert_eq!(capture_name("*filepath"), Some("filepath"));
        assert_eq!(capture_name(":"), Some(""));
        assert_eq!(capture_name("users"), None);
        assert_eq!(capture_name("a:b"), None);
    }
}
