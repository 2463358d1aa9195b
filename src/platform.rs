use serde::{Deserialize, Serialize};
use std::fmt;

/// Known source platforms, matched by hostname substring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Platform {
    YouTube,
    Vimeo,
    Dailymotion,
    Twitch,
    Facebook,
    Instagram,
    TikTok,
    Twitter,
    Reddit,
    SoundCloud,
    Unknown,
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Platform::YouTube => "YouTube",
            Platform::Vimeo => "Vimeo",
            Platform::Dailymotion => "Dailymotion",
            Platform::Twitch => "Twitch",
            Platform::Facebook => "Facebook",
            Platform::Instagram => "Instagram",
            Platform::TikTok => "TikTok",
            Platform::Twitter => "Twitter/X",
            Platform::Reddit => "Reddit",
            Platform::SoundCloud => "SoundCloud",
            Platform::Unknown => "Unknown",
        };
        write!(f, "{}", name)
    }
}

/// Hostname substrings mapped to platforms. Order matters only in that the
/// first match wins; entries are mutually exclusive in practice.
const PLATFORM_DOMAINS: &[(&str, Platform)] = &[
    ("youtube.com", Platform::YouTube),
    ("youtu.be", Platform::YouTube),
    ("vimeo.com", Platform::Vimeo),
    ("dailymotion.com", Platform::Dailymotion),
    ("twitch.tv", Platform::Twitch),
    ("facebook.com", Platform::Facebook),
    ("instagram.com", Platform::Instagram),
    ("tiktok.com", Platform::TikTok),
    ("twitter.com", Platform::Twitter),
    ("x.com", Platform::Twitter),
    ("reddit.com", Platform::Reddit),
    ("soundcloud.com", Platform::SoundCloud),
];

/// Capability profile derived from the source URL, computed once per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformProfile {
    pub platform: Platform,
    /// Whether the platform's extractor honors height-bounded selector
    /// expressions. When false, tiered requests acquire at best quality and
    /// downscale locally afterwards.
    pub native_height_selectors: bool,
}

impl PlatformProfile {
    pub fn needs_downscale(&self) -> bool {
        !self.native_height_selectors
    }
}

/// Classify a URL into a platform profile. Total over all inputs: unknown
/// hosts get the conservative Unknown profile.
pub fn classify(url: &str) -> PlatformProfile {
    let url_lower = url.to_lowercase();
    let platform = PLATFORM_DOMAINS
        .iter()
        .find(|(domain, _)| url_lower.contains(*domain))
        .map(|(_, platform)| *platform)
        .unwrap_or(Platform::Unknown);

    PlatformProfile {
        platform,
        native_height_selectors: matches!(
            platform,
            Platform::YouTube | Platform::Vimeo | Platform::Dailymotion | Platform::Twitch
        ),
    }
}

/// Display name for a fetch-tool extractor id, for hosts the URL table does
/// not know. Falls back to capitalizing the extractor name.
pub fn display_name_from_extractor(extractor: &str) -> String {
    let extractor_lower = extractor.to_lowercase();
    let known: &[(&str, &str)] = &[
        ("youtube", "YouTube"),
        ("vimeo", "Vimeo"),
        ("dailymotion", "Dailymotion"),
        ("twitch", "Twitch"),
        ("facebook", "Facebook"),
        ("instagram", "Instagram"),
        ("tiktok", "TikTok"),
        ("twitter", "Twitter/X"),
        ("reddit", "Reddit"),
        ("soundcloud", "SoundCloud"),
        ("generic", "Web Video"),
    ];

    if let Some((_, name)) = known.iter().find(|(key, _)| extractor_lower.contains(*key)) {
        return name.to_string();
    }

    let mut chars = extractor.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => "Unknown".to_string(),
    }
}

/// Shape-validate a URL before handing it to the fetch tool: it must carry a
/// scheme (or www. prefix) and point at a known platform domain.
pub fn is_valid_url(url: &str) -> bool {
    let url = url.trim();
    if url.is_empty() {
        return false;
    }

    if !(url.starts_with("http://") || url.starts_with("https://") || url.starts_with("www.")) {
        return false;
    }

    let url_lower = url.to_lowercase();
    PLATFORM_DOMAINS
        .iter()
        .any(|(domain, _)| url_lower.contains(*domain))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_known_platforms() {
        assert_eq!(
            classify("https://www.youtube.com/watch?v=abc").platform,
            Platform::YouTube
        );
        assert_eq!(classify("https://youtu.be/abc").platform, Platform::YouTube);
        assert_eq!(classify("https://x.com/user/status/1").platform, Platform::Twitter);
        assert_eq!(
            classify("https://www.tiktok.com/@user/video/1").platform,
            Platform::TikTok
        );
    }

    #[test]
    fn test_unknown_host_gets_conservative_profile() {
        let profile = classify("https://example.org/video.mp4");
        assert_eq!(profile.platform, Platform::Unknown);
        assert!(profile.needs_downscale());
    }

    #[test]
    fn test_height_selector_capability() {
        assert!(!classify("https://www.youtube.com/watch?v=x").needs_downscale());
        assert!(!classify("https://vimeo.com/12345").needs_downscale());
        assert!(classify("https://www.instagram.com/reel/x").needs_downscale());
        assert!(classify("https://twitter.com/u/status/1").needs_downscale());
    }

    #[test]
    fn test_url_validation_requires_scheme() {
        assert!(is_valid_url("https://www.youtube.com/watch?v=x"));
        assert!(is_valid_url("www.youtube.com/watch?v=x"));
        assert!(!is_valid_url("youtube.com/watch?v=x"));
        assert!(!is_valid_url("ftp://youtube.com/watch?v=x"));
    }

    #[test]
    fn test_url_validation_requires_known_domain() {
        assert!(!is_valid_url("https://example.org/clip"));
        assert!(!is_valid_url(""));
        assert!(!is_valid_url("   "));
    }

    #[test]
    fn test_extractor_display_names() {
        assert_eq!(display_name_from_extractor("youtube:tab"), "YouTube");
        assert_eq!(display_name_from_extractor("generic"), "Web Video");
        assert_eq!(display_name_from_extractor("bandcamp"), "Bandcamp");
    }
}
