//! Extraction error types.

use std::time::Duration;

use thiserror::Error;

use crate::tool::ToolError;

/// Errors from playlist metadata fetches and video enumeration.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The tool run itself failed.
    #[error(transparent)]
    Tool(#[from] ToolError),

    /// The tool produced no output for the playlist.
    #[error("playlist not found: no metadata returned for {target}")]
    NotFound {
        /// URL or id that was requested.
        target: String,
    },

    /// The metadata record was not valid JSON.
    #[error("could not parse playlist metadata for {target}: {source}")]
    Parse {
        /// URL or id that was requested.
        target: String,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// Enumeration exceeded its deadline.
    #[error(
        "listing playlist videos timed out after {timeout:?}; the playlist may be very large or the service slow"
    )]
    EnumerationTimedOut {
        /// The deadline that elapsed.
        timeout: Duration,
    },

    /// Output was non-empty but no line described a video.
    #[error("no videos could be read from {lines} lines of extraction tool output")]
    EnumerationExhausted {
        /// Number of non-empty lines received.
        lines: usize,
    },

    /// The remote service requires signing in.
    #[error("the playlist requires signing in to the remote service")]
    AuthRequired,

    /// The playlist or its videos are private.
    #[error("the playlist is private")]
    PrivateContent,
}

impl ExtractError {
    /// Reclassifies a failed tool run by looking at its stderr.
    ///
    /// Sign-in walls and private content map to their own variants; anything
    /// else stays a [`ExtractError::Tool`].
    #[must_use]
    pub fn from_tool_failure(error: ToolError) -> Self {
        match error.stderr().and_then(classify_access_text) {
            Some(classified) => classified,
            None => Self::Tool(error),
        }
    }
}

/// Maps tool output that names an access restriction to its error.
pub(crate) fn classify_access_text(text: &str) -> Option<ExtractError> {
    let lower = text.to_lowercase();
    if lower.contains("sign in") {
        Some(ExtractError::AuthRequired)
    } else if lower.contains("private video") {
        Some(ExtractError::PrivateContent)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_in_stderr_is_auth_required() {
        let error = ExtractError::from_tool_failure(ToolError::process_execution(
            Some(1),
            "ERROR: Sign in to confirm your age",
        ));
        assert!(matches!(error, ExtractError::AuthRequired));
    }

    #[test]
    fn test_private_stderr_is_private_content() {
        let error = ExtractError::from_tool_failure(ToolError::process_execution(
            Some(1),
            "ERROR: [youtube] abc: Private video",
        ));
        assert!(matches!(error, ExtractError::PrivateContent));
    }

    #[test]
    fn test_other_stderr_stays_tool_error() {
        let error = ExtractError::from_tool_failure(ToolError::process_execution(
            Some(1),
            "ERROR: Unsupported URL",
        ));
        assert!(matches!(error, ExtractError::Tool(_)));
        assert!(error.to_string().contains("Unsupported URL"));
    }

    #[test]
    fn test_timeout_message_mentions_large_playlist() {
        let msg = ExtractError::EnumerationTimedOut {
            timeout: Duration::from_secs(120),
        }
        .to_string();
        assert!(msg.contains("very large"), "got: {msg}");
    }
}
