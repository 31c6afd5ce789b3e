//! Wake phrase matching on transcripts
//!
//! Transcripts come from a cloud recognizer that often mangles a name, so
//! matching is tiered from strict to loose and the first tier with a hit
//! wins. Within a tier phrases are tried in configured order.
//!
//! The fragment tier fires on short syllables anywhere in the transcript
//! and will produce false positives on ordinary speech ("man", "tre").

use std::fmt;

use crate::{Error, Result};

/// Characters of a phrase used by the prefix tier
const PREFIX_CHARS: usize = 3;

/// Phrases used when none are configured
pub const DEFAULT_WAKE_PHRASES: &[&str] = &[
    "jarvis",
    "자비스",
    "제비스",
    "atreides",
    "아트레이디스",
    "아트레이데스",
    "아트레",
    "ironman",
    "아이언맨",
];

/// Loose fragments of the default phrase family
pub const DEFAULT_WAKE_FRAGMENTS: &[&str] =
    &["비스", "vis", "트레", "tre", "맨", "man", "자비", "jarv"];

/// Which rule produced a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MatchTier {
    /// Phrase appears verbatim
    Exact,
    /// First three characters of the phrase appear
    Prefix,
    /// Phrase appears once all whitespace is removed
    Spacing,
    /// A known fragment appears
    Fragment,
}

impl fmt::Display for MatchTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Exact => "exact",
            Self::Prefix => "prefix",
            Self::Spacing => "spacing",
            Self::Fragment => "fragment",
        })
    }
}

/// Outcome of a wake check; the raw transcript is always kept
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WakeMatch {
    pub matched: bool,
    /// Phrase (or fragment, for the fragment tier) that hit
    pub phrase: Option<String>,
    pub tier: Option<MatchTier>,
    pub transcript: String,
}

impl WakeMatch {
    fn hit(tier: MatchTier, phrase: &str, transcript: &str) -> Self {
        Self {
            matched: true,
            phrase: Some(phrase.to_string()),
            tier: Some(tier),
            transcript: transcript.to_string(),
        }
    }

    fn miss(transcript: &str) -> Self {
        Self {
            matched: false,
            phrase: None,
            tier: None,
            transcript: transcript.to_string(),
        }
    }

    /// Text following the matched phrase, for "jarvis, pick up the cup"
    ///
    /// Only meaningful for exact matches; empty otherwise.
    #[must_use]
    pub fn command(&self) -> String {
        match (self.tier, self.phrase.as_deref()) {
            (Some(MatchTier::Exact), Some(phrase)) => extract_command(&self.transcript, phrase),
            _ => String::new(),
        }
    }
}

/// Checks transcripts against an ordered phrase set
#[derive(Debug, Clone)]
pub struct WakePhraseMatcher {
    phrases: Vec<String>,
    fragments: Vec<String>,
}

impl WakePhraseMatcher {
    /// Create a matcher; phrases and fragments are lower-cased and trimmed
    ///
    /// # Errors
    ///
    /// Returns error if no non-empty phrase remains
    pub fn new(phrases: Vec<String>, fragments: Vec<String>) -> Result<Self> {
        let phrases = normalize_all(phrases);
        if phrases.is_empty() {
            return Err(Error::Config("at least one wake phrase is required".to_string()));
        }
        let fragments = normalize_all(fragments);

        tracing::debug!(phrases = ?phrases, fragments = fragments.len(), "wake phrase matcher initialized");
        Ok(Self { phrases, fragments })
    }

    /// Matcher for the built-in phrase family
    #[must_use]
    pub fn with_defaults() -> Self {
        Self {
            phrases: normalize_all(DEFAULT_WAKE_PHRASES.iter().map(ToString::to_string)),
            fragments: normalize_all(DEFAULT_WAKE_FRAGMENTS.iter().map(ToString::to_string)),
        }
    }

    #[must_use]
    pub fn phrases(&self) -> &[String] {
        &self.phrases
    }

    #[must_use]
    pub fn fragments(&self) -> &[String] {
        &self.fragments
    }

    /// Check a transcript
    #[must_use]
    pub fn check(&self, transcript: &str) -> WakeMatch {
        let text = transcript.trim().to_lowercase();
        if text.is_empty() {
            return WakeMatch::miss(transcript);
        }

        let result = self.find(&text).map_or_else(
            || WakeMatch::miss(transcript),
            |(tier, phrase)| WakeMatch::hit(tier, phrase, transcript),
        );

        if let (Some(tier), Some(phrase)) = (result.tier, result.phrase.as_deref()) {
            tracing::info!(%tier, phrase, transcript, "wake phrase detected");
        } else {
            tracing::debug!(transcript, "no wake phrase");
        }
        result
    }

    fn find(&self, text: &str) -> Option<(MatchTier, &str)> {
        if let Some(p) = self.phrases.iter().find(|p| text.contains(p.as_str())) {
            return Some((MatchTier::Exact, p));
        }

        if let Some(p) = self.phrases.iter().find(|p| {
            p.chars().count() >= PREFIX_CHARS
                && text.contains(p.chars().take(PREFIX_CHARS).collect::<String>().as_str())
        }) {
            return Some((MatchTier::Prefix, p));
        }

        let squashed = strip_whitespace(text);
        if let Some(p) = self
            .phrases
            .iter()
            .find(|p| squashed.contains(p.as_str()))
        {
            return Some((MatchTier::Spacing, p));
        }

        self.fragments
            .iter()
            .find(|f| text.contains(f.as_str()))
            .map(|f| (MatchTier::Fragment, f.as_str()))
    }
}

fn normalize_all(items: impl IntoIterator<Item = String>) -> Vec<String> {
    items
        .into_iter()
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

fn strip_whitespace(s: &str) -> String {
    s.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Extract the command that follows a wake phrase
fn extract_command(transcript: &str, phrase: &str) -> String {
    transcript
        .char_indices()
        .find_map(|(start, _)| phrase_end(transcript, start, phrase))
        .map_or_else(String::new, |end| {
            transcript[end..]
                .trim_start_matches(|c: char| {
                    c.is_whitespace() || matches!(c, ',' | '.' | '!' | '?')
                })
                .trim_end()
                .to_string()
        })
}

/// Byte offset in `transcript` just past a case-insensitive match of the
/// lower-case `phrase` starting at `start`
///
/// Works per character so offsets always land on a boundary of the
/// original text, whatever lower-casing does to byte lengths.
fn phrase_end(transcript: &str, start: usize, phrase: &str) -> Option<usize> {
    let mut wanted = phrase.chars().peekable();
    for (offset, c) in transcript[start..].char_indices() {
        for lower in c.to_lowercase() {
            if wanted.next() != Some(lower) {
                return None;
            }
        }
        if wanted.peek().is_none() {
            return Some(start + offset + c.len_utf8());
        }
    }
    None
}
