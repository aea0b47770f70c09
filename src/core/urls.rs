//! Media URL recognition in free-form chat text
//!
//! A [`UrlMatcher`] holds an ordered list of [`UrlPattern`]s, one per
//! supported host family. Adding a host means registering another pattern;
//! the conversation controller only ever talks to the matcher.

use lazy_regex::regex;
use regex::Regex;

/// Characters that end a sentence rather than a URL.
const TRAILING_PUNCTUATION: &[char] = &['.', ',', ';', ':', '!', '?', ')', ']', '}', '>', '"', '\'', '»'];

/// A recognizer for one family of media links.
pub trait UrlPattern: Send + Sync {
    /// Human-readable name of the host family (e.g. "YouTube")
    fn name(&self) -> &str;

    /// Returns the byte range of the first link in `text`, if any.
    fn find(&self, text: &str) -> Option<(usize, usize)>;
}

/// A [`UrlPattern`] backed by a regular expression.
///
/// The scheme is optional in the expression; the match is trimmed of
/// trailing sentence punctuation.
pub struct HostPattern {
    name: String,
    regex: Regex,
}

impl HostPattern {
    /// Compiles a pattern from an expression string.
    pub fn new(name: impl Into<String>, expression: &str) -> Result<Self, regex::Error> {
        Ok(Self::from_regex(name, Regex::new(expression)?))
    }

    pub fn from_regex(name: impl Into<String>, regex: Regex) -> Self {
        Self {
            name: name.into(),
            regex,
        }
    }

    /// YouTube watch, short-link, shorts and music links.
    ///
    /// A link must carry a video id: `watch` needs a `v=` parameter, short
    /// links and shorts need a path segment.
    pub fn youtube() -> Self {
        let re = regex!(
            r"(?i)(?:https?://)?(?:(?:www|m|music)\.)?(?:youtube\.com/(?:watch\?(?:\S*?&)?v=[\w-]\S*|shorts/[\w-]\S*)|youtu\.be/[\w-]\S*)"
        );
        Self::from_regex("YouTube", Regex::clone(re))
    }
}

impl UrlPattern for HostPattern {
    fn name(&self) -> &str {
        &self.name
    }

    fn find(&self, text: &str) -> Option<(usize, usize)> {
        let m = self.regex.find(text)?;
        let trimmed = m.as_str().trim_end_matches(TRAILING_PUNCTUATION);
        // What is left after trimming must still be a whole link
        let whole = self
            .regex
            .find(trimmed)
            .is_some_and(|again| again.start() == 0 && again.end() == trimmed.len());
        if !whole {
            return None;
        }
        Some((m.start(), m.start() + trimmed.len()))
    }
}

/// Ordered set of URL patterns.
pub struct UrlMatcher {
    patterns: Vec<Box<dyn UrlPattern>>,
}

impl UrlMatcher {
    /// Create an empty matcher.
    pub fn new() -> Self {
        Self { patterns: Vec::new() }
    }

    /// Register a pattern. Patterns are tried in insertion order.
    pub fn register(&mut self, pattern: Box<dyn UrlPattern>) {
        self.patterns.push(pattern);
    }

    /// Builder-style [`UrlMatcher::register`].
    pub fn with(mut self, pattern: impl UrlPattern + 'static) -> Self {
        self.register(Box::new(pattern));
        self
    }

    /// Finds the earliest supported link in `text` and returns it verbatim.
    ///
    /// When several patterns match, the one starting first in the text wins;
    /// ties go to the pattern registered first.
    pub fn find_media_url(&self, text: &str) -> Option<String> {
        self.patterns
            .iter()
            .filter_map(|pattern| pattern.find(text).map(|range| (range, pattern.name())))
            .min_by_key(|((start, _), _)| *start)
            .map(|((start, end), name)| {
                log::debug!("Matched {} link at {}..{}", name, start, end);
                text[start..end].to_string()
            })
    }
}

impl Default for UrlMatcher {
    /// The hosts the bot supports out of the box.
    fn default() -> Self {
        Self::new().with(HostPattern::youtube())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_url_from_surrounding_text() {
        let matcher = UrlMatcher::default();
        assert_eq!(
            matcher.find_media_url("check this out https://youtu.be/abc123 nice"),
            Some("https://youtu.be/abc123".to_string())
        );
    }

    #[test]
    fn test_scheme_is_optional() {
        let matcher = UrlMatcher::default();
        assert_eq!(
            matcher.find_media_url("www.youtube.com/watch?v=dQw4w9WgXcQ please"),
            Some("www.youtube.com/watch?v=dQw4w9WgXcQ".to_string())
        );
        assert_eq!(
            matcher.find_media_url("youtu.be/xyz"),
            Some("youtu.be/xyz".to_string())
        );
    }

    #[test]
    fn test_trailing_punctuation_is_not_part_of_url() {
        let matcher = UrlMatcher::default();
        assert_eq!(
            matcher.find_media_url("look: https://youtu.be/abc123."),
            Some("https://youtu.be/abc123".to_string())
        );
        assert_eq!(
            matcher.find_media_url("(https://www.youtube.com/watch?v=abc&t=10s), right?"),
            Some("https://www.youtube.com/watch?v=abc&t=10s".to_string())
        );
    }

    #[test]
    fn test_shorts_and_music_links() {
        let matcher = UrlMatcher::default();
        assert_eq!(
            matcher.find_media_url("https://youtube.com/shorts/AbC_123"),
            Some("https://youtube.com/shorts/AbC_123".to_string())
        );
        assert_eq!(
            matcher.find_media_url("https://music.youtube.com/watch?v=q1"),
            Some("https://music.youtube.com/watch?v=q1".to_string())
        );
    }

    #[test]
    fn test_rejects_unsupported_text() {
        let matcher = UrlMatcher::default();
        assert_eq!(matcher.find_media_url("hello there"), None);
        assert_eq!(matcher.find_media_url("https://example.com/watch?v=1"), None);
        assert_eq!(matcher.find_media_url("https://youtube.com/"), None);
        assert_eq!(matcher.find_media_url("see https://www.youtube.com/watch? ok"), None);
        assert_eq!(matcher.find_media_url("youtu.be/."), None);
        assert_eq!(matcher.find_media_url("https://www.youtube.com/watch?list=PL1"), None);
        assert_eq!(matcher.find_media_url("https://youtube.com/shorts/"), None);
    }

    #[test]
    fn test_video_id_may_follow_other_parameters() {
        let matcher = UrlMatcher::default();
        assert_eq!(
            matcher.find_media_url("https://www.youtube.com/watch?feature=share&v=abc-_1!"),
            Some("https://www.youtube.com/watch?feature=share&v=abc-_1".to_string())
        );
    }

    #[test]
    fn test_additional_host_pattern_is_used() {
        let matcher = UrlMatcher::default().with(HostPattern::new("Vimeo", r"(?:https?://)?vimeo\.com/\d+").unwrap());
        assert_eq!(
            matcher.find_media_url("see vimeo.com/12345 and more"),
            Some("vimeo.com/12345".to_string())
        );
    }

    #[test]
    fn test_earliest_match_wins_across_patterns() {
        let matcher = UrlMatcher::default().with(HostPattern::new("Vimeo", r"(?:https?://)?vimeo\.com/\d+").unwrap());
        assert_eq!(
            matcher.find_media_url("vimeo.com/1 then youtu.be/abc"),
            Some("vimeo.com/1".to_string())
        );
    }
}
