use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Publishing targets the agent can write for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Platform {
    #[serde(rename = "linkedin")]
    LinkedIn,
    #[serde(rename = "twitter", alias = "x")]
    Twitter,
    #[serde(rename = "threads")]
    Threads,
    #[serde(rename = "instagram")]
    Instagram,
    #[serde(rename = "youtube_short", alias = "youtube")]
    YoutubeShort,
    #[serde(rename = "newsletter")]
    Newsletter,
}

/// Shape of one publishable artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitKind {
    /// A single post.
    Post,
    /// Numbered posts separated by blank lines.
    Thread,
    /// Caption under an image or carousel.
    Caption,
    /// Spoken script with on-screen cues.
    Script,
    /// Long-form email body.
    Email,
}

/// Format constraints and prompt guidance for one platform.
#[derive(Debug, Clone, PartialEq)]
pub struct PlatformProfile {
    pub display_name: &'static str,
    pub unit: UnitKind,
    /// Character limit of one unit (one tweet, one post).
    pub unit_char_limit: usize,
    /// Character limit of the whole artifact.
    pub total_char_limit: usize,
    pub max_hashtags: usize,
    /// `max_tokens` for model calls on this platform.
    pub max_tokens: u32,
    pub guidance: &'static str,
}

impl Platform {
    pub const ALL: [Platform; 6] = [
        Platform::LinkedIn,
        Platform::Twitter,
        Platform::Threads,
        Platform::Instagram,
        Platform::YoutubeShort,
        Platform::Newsletter,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Platform::LinkedIn => "linkedin",
            Platform::Twitter => "twitter",
            Platform::Threads => "threads",
            Platform::Instagram => "instagram",
            Platform::YoutubeShort => "youtube_short",
            Platform::Newsletter => "newsletter",
        }
    }

    pub fn profile(self) -> PlatformProfile {
        match self {
            Platform::LinkedIn => PlatformProfile {
                display_name: "LinkedIn",
                unit: UnitKind::Post,
                unit_char_limit: 3000,
                total_char_limit: 3000,
                max_hashtags: 5,
                max_tokens: 2048,
                guidance: "Open with a hook that fits in the first two lines before the \
                           'see more' fold. Use short paragraphs of one to three sentences \
                           separated by blank lines. End with a question or a clear takeaway.",
            },
            Platform::Twitter => PlatformProfile {
                display_name: "X / Twitter",
                unit: UnitKind::Thread,
                unit_char_limit: 280,
                total_char_limit: 280 * 12,
                max_hashtags: 2,
                max_tokens: 2048,
                guidance: "Write a thread. Each tweet stands alone, is at most 280 characters, \
                           and is separated from the next by a blank line. The first tweet \
                           carries the hook; the last one carries the payoff.",
            },
            Platform::Threads => PlatformProfile {
                display_name: "Threads",
                unit: UnitKind::Post,
                unit_char_limit: 500,
                total_char_limit: 500,
                max_hashtags: 1,
                max_tokens: 1024,
                guidance: "Conversational single post under 500 characters. One idea, \
                           told plainly, with at most one topic tag.",
            },
            Platform::Instagram => PlatformProfile {
                display_name: "Instagram",
                unit: UnitKind::Caption,
                unit_char_limit: 2200,
                total_char_limit: 2200,
                max_hashtags: 10,
                max_tokens: 1536,
                guidance: "Caption for a carousel or image. The first 125 characters must \
                           earn the tap on 'more'. Put hashtags on the final line.",
            },
            Platform::YoutubeShort => PlatformProfile {
                display_name: "YouTube Shorts",
                unit: UnitKind::Script,
                unit_char_limit: 1200,
                total_char_limit: 1200,
                max_hashtags: 3,
                max_tokens: 2048,
                guidance: "Script for a spoken video under 60 seconds. Hook in the first \
                           three seconds, one line per beat, on-screen text cues in square \
                           brackets.",
            },
            Platform::Newsletter => PlatformProfile {
                display_name: "Newsletter",
                unit: UnitKind::Email,
                unit_char_limit: 8000,
                total_char_limit: 8000,
                max_hashtags: 0,
                max_tokens: 4096,
                guidance: "Email body with a subject line on the first line prefixed by \
                           'Subject:'. Sections with short headers, one concrete example per \
                           section, a single call to action at the end.",
            },
        }
    }
}

impl PlatformProfile {
    /// Split an artifact into its publishable units.
    ///
    /// Threads split on blank lines; every other kind is one unit.
    pub fn split_units<'a>(&self, content: &'a str) -> Vec<&'a str> {
        match self.unit {
            UnitKind::Thread => content
                .split("\n\n")
                .map(str::trim)
                .filter(|u| !u.is_empty())
                .collect(),
            _ => {
                let trimmed = content.trim();
                if trimmed.is_empty() {
                    Vec::new()
                } else {
                    vec![trimmed]
                }
            }
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "linkedin" => Ok(Platform::LinkedIn),
            "twitter" | "x" => Ok(Platform::Twitter),
            "threads" => Ok(Platform::Threads),
            "instagram" => Ok(Platform::Instagram),
            "youtube_short" | "youtube" | "shorts" => Ok(Platform::YoutubeShort),
            "newsletter" | "email" => Ok(Platform::Newsletter),
            _ => Err(format!(
                "Invalid platform: {s}. Use linkedin, twitter, threads, instagram, youtube_short or newsletter."
            )),
        }
    }
}
