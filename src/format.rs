//! Format selection for single-video downloads.
//!
//! [`select_format`] maps a container preference and a quality tier label to
//! the selector expression the extraction tool understands. It is pure and
//! deterministic.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Height bound used when a quality tier is not recognized.
pub const DEFAULT_HEIGHT: u32 = 1080;

const AUDIO_EXPRESSION: &str = "bestaudio[ext=m4a]/bestaudio";
const BEST_EXPRESSION: &str = "bestvideo+bestaudio/best";

/// Recognized quality tiers and their height bounds.
const QUALITY_TIERS: &[(&str, u32)] = &[
    ("360p", 360),
    ("480p", 480),
    ("720p", 720),
    ("1080p", 1080),
    ("1440p", 1440),
    ("2160p", 2160),
];

/// What kind of output the user wants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerPreference {
    /// Audio only; quality tier is ignored.
    Audio,
    /// Video bounded by the quality tier.
    #[default]
    Video,
    /// Best available video and audio, unconstrained.
    Best,
}

impl ContainerPreference {
    /// Returns the lowercase label.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Audio => "audio",
            Self::Video => "video",
            Self::Best => "best",
        }
    }

    /// File extension of the downloaded result.
    #[must_use]
    pub fn file_extension(&self) -> &'static str {
        match self {
            Self::Audio => "mp3",
            Self::Video | Self::Best => "mp4",
        }
    }
}

impl fmt::Display for ContainerPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ContainerPreference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "audio" => Ok(Self::Audio),
            "video" => Ok(Self::Video),
            "best" => Ok(Self::Best),
            _ => Err(format!("invalid container preference: {s}")),
        }
    }
}

/// Opaque selector string passed to the extraction tool via `-f`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FormatExpression(String);

impl FormatExpression {
    /// Returns the expression text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FormatExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<FormatExpression> for String {
    fn from(expression: FormatExpression) -> Self {
        expression.0
    }
}

/// Returns the height bound for a tier label such as `720p`, if recognized.
#[must_use]
pub fn height_for_tier(tier: &str) -> Option<u32> {
    let tier = tier.trim();
    QUALITY_TIERS
        .iter()
        .find(|(label, _)| label.eq_ignore_ascii_case(tier))
        .map(|(_, height)| *height)
}

/// Builds the format expression for `container` at `quality_tier`.
#[must_use]
pub fn select_format(container: ContainerPreference, quality_tier: &str) -> FormatExpression {
    let expression = match container {
        ContainerPreference::Audio => AUDIO_EXPRESSION.to_string(),
        ContainerPreference::Best => BEST_EXPRESSION.to_string(),
        ContainerPreference::Video => {
            let height = height_for_tier(quality_tier).unwrap_or(DEFAULT_HEIGHT);
            format!("bestvideo[height<={height}]+bestaudio/best[height<={height}]")
        }
    };
    FormatExpression(expression)
}
