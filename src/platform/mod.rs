use std::fmt;

/// Identifier of the source service a URL belongs to.
///
/// One downloader serves all platforms; the tag only carries the per-platform
/// bits that differ (display name, filename fallback), replacing the
/// per-platform subclasses the project started with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlatformTag {
    Youtube,
    Facebook,
    TikTok,
    X,
}

impl PlatformTag {
    /// Lowercase label, used in log lines and as the title fallback when a
    /// remote probe yields no usable title.
    pub fn name(&self) -> &'static str {
        match self {
            PlatformTag::Youtube => "youtube",
            PlatformTag::Facebook => "facebook",
            PlatformTag::TikTok => "tiktok",
            PlatformTag::X => "x",
        }
    }
}

impl fmt::Display for PlatformTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Ordered substring rules, first match wins. Kept as data so the match
/// order is explicit and testable.
const RULES: &[(&[&str], PlatformTag)] = &[
    (&["facebook.com", "fb.watch"], PlatformTag::Facebook),
    (&["youtube.com", "youtu.be"], PlatformTag::Youtube),
    (&["tiktok.com"], PlatformTag::TikTok),
    (&["twitter.com", "x.com"], PlatformTag::X),
];

/// Map a URL to its platform. `None` is a normal result (the caller skips
/// the item), not a failure; this never does I/O.
pub fn resolve(url: &str) -> Option<PlatformTag> {
    let url_lower = url.to_lowercase();
    RULES
        .iter()
        .find(|(needles, _)| needles.iter().any(|n| url_lower.contains(n)))
        .map(|(_, tag)| *tag)
}

/// All supported platforms, for the `platforms` listing.
pub fn supported() -> Vec<PlatformTag> {
    let mut seen = Vec::new();
    for (_, tag) in RULES {
        if !seen.contains(tag) {
            seen.push(*tag);
        }
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_youtube() {
        assert_eq!(
            resolve("https://www.youtube.com/watch?v=abc12345678"),
            Some(PlatformTag::Youtube)
        );
        assert_eq!(
            resolve("https://youtu.be/abc12345678"),
            Some(PlatformTag::Youtube)
        );
        assert_eq!(
            resolve("https://m.youtube.com/watch?v=abc12345678"),
            Some(PlatformTag::Youtube)
        );
    }

    #[test]
    fn test_resolve_facebook() {
        assert_eq!(
            resolve("https://www.facebook.com/watch/?v=123"),
            Some(PlatformTag::Facebook)
        );
        assert_eq!(resolve("https://fb.watch/abcdef/"), Some(PlatformTag::Facebook));
    }

    #[test]
    fn test_resolve_tiktok() {
        assert_eq!(
            resolve("https://www.tiktok.com/@user/video/123"),
            Some(PlatformTag::TikTok)
        );
    }

    #[test]
    fn test_resolve_x() {
        assert_eq!(
            resolve("https://twitter.com/user/status/123"),
            Some(PlatformTag::X)
        );
        assert_eq!(resolve("https://x.com/user/status/123"), Some(PlatformTag::X));
    }

    #[test]
    fn test_resolve_is_case_insensitive() {
        assert_eq!(
            resolve("HTTPS://WWW.YOUTUBE.COM/watch?v=abc"),
            Some(PlatformTag::Youtube)
        );
    }

    #[test]
    fn test_resolve_unknown_url() {
        assert_eq!(resolve("https://example.com/video.mp4"), None);
        assert_eq!(resolve("not even a url"), None);
    }

    #[test]
    fn test_first_match_wins() {
        // A URL mentioning two platforms resolves to the earlier rule.
        assert_eq!(
            resolve("https://facebook.com/share?u=youtube.com"),
            Some(PlatformTag::Facebook)
        );
    }

    #[test]
    fn test_supported_lists_each_platform_once() {
        let all = supported();
        assert_eq!(all.len(), 4);
        assert!(all.contains(&PlatformTag::Youtube));
        assert!(all.contains(&PlatformTag::X));
    }
}
