//! Conversion history records and the stored-artifact key rule.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Well-known store key holding the serialized history log.
pub const HISTORY_KEY: &str = "history-list";

/// Prefix applied to generated artifact keys.
pub const GENERATED_KEY_PREFIX: &str = "html-";

/// One conversion event in the history log.
///
/// Field names on the wire follow the layout already present in deployed
/// stores: `markdown`, `htmlContent` and `timestamp`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionRecord {
    #[serde(rename = "markdown")]
    pub input: String,
    #[serde(rename = "htmlContent")]
    pub output: String,
    /// Milliseconds since the Unix epoch, assigned when the record is appended.
    #[serde(rename = "timestamp")]
    pub created_at: i64,
}

impl ConversionRecord {
    pub fn new(input: impl Into<String>, output: impl Into<String>, created_at: i64) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            created_at,
        }
    }
}

/// Effective key under which a rendered artifact is stored.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ArtifactKey(String);

impl ArtifactKey {
    /// Use the caller key verbatim when it carries any non-whitespace
    /// character, otherwise generate `html-<now_ms>`.
    ///
    /// Two generated keys derived within the same millisecond are identical;
    /// the later write wins.
    pub fn derive(explicit: Option<&str>, now_ms: i64) -> Self {
        match explicit {
            Some(key) if !key.trim().is_empty() => Self(key.to_string()),
            _ => Self::generated(now_ms),
        }
    }

    pub fn generated(now_ms: i64) -> Self {
        Self(format!("{GENERATED_KEY_PREFIX}{now_ms}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ArtifactKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
