//! Slash-delimited application paths.
//!
//! The root application has the empty path; every other application path is
//! `/` followed by its segments joined with `/` (e.g. `/site/admin`).
//! Parsing ignores empty segments and surrounding whitespace, so `site//admin/`
//! and `/site/admin` address the same node.

/// Split a path into its non-empty, trimmed segments.
pub fn segments(path: &str) -> Vec<&str> {
    path.split('/')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Whether `segment` can name an application.
///
/// Segments map onto directory names, so anything that could escape the
/// application root is refused.
pub fn is_valid_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment != "."
        && segment != ".."
        && !segment.contains(['/', '\\', '\0'])
}

/// Parse `path` into validated segments, or `None` if any segment is invalid.
pub fn parse(path: &str) -> Option<Vec<&str>> {
    let segments = segments(path);
    segments
        .iter()
        .all(|s| is_valid_segment(s))
        .then_some(segments)
}

/// Path of the child `name` under `parent`.
pub fn join(parent: &str, name: &str) -> String {
    format!("{parent}/{name}")
}

/// Canonical form of `path` (root is the empty string).
pub fn normalize(path: &str) -> String {
    segments(path).iter().fold(String::new(), |acc, s| join(&acc, s))
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn splits_on_slashes() {
        assert_eq!(segments("/site/admin"), vec!["site", "admin"]);
    }

    #[test]
    fn ignores_empty_and_blank_segments() {
        assert_eq!(segments("//site/ /admin/"), vec!["site", "admin"]);
        assert!(segments("").is_empty());
        assert!(segments("/").is_empty());
    }

    #[test]
    fn join_builds_child_paths() {
        assert_eq!(join("", "site"), "/site");
        assert_eq!(join("/site", "admin"), "/site/admin");
    }

    #[test]
    fn normalize_canonicalizes() {
        assert_eq!(normalize("site//admin/"), "/site/admin");
        assert_eq!(normalize("/"), "");
    }

    #[test]
    fn rejects_traversal_segments() {
        assert!(parse("/site/../etc").is_none());
        assert!(parse("/./site").is_none());
        assert!(parse("/a\\b").is_none());
        assert_eq!(parse("/site/admin"), Some(vec!["site", "admin"]));
    }

    proptest! {
        #[test]
        fn segments_are_never_empty_or_slashed(path in "[a-z/ ]{0,32}") {
            for segment in segments(&path) {
                prop_assert!(!segment.is_empty());
                prop_assert!(!segment.contains('/'));
                prop_assert_eq!(segment, segment.trim());
            }
        }

        #[test]
        fn normalize_is_idempotent(path in "[a-z/]{0,32}") {
            let once = normalize(&path);
            prop_assert_eq!(normalize(&once), once.clone());
            prop_assert_eq!(segments(&once), segments(&path));
        }
    }
}
