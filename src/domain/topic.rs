use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Normalized relevance topic.
///
/// Topics are compared case-insensitively with surrounding whitespace
/// ignored, so `" Technology"` and `"technology"` route to the same model.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TopicKey(String);

impl TopicKey {
    pub fn new(raw: &str) -> Self {
        Self(raw.trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Filename-safe form used in cache keys and artifact names.
    ///
    /// Alphanumeric keys (any script, plus `_`) are used as-is. When any
    /// character had to be replaced, a short digest of the full key is
    /// appended, so distinct topics never share a slug.
    pub fn slug(&self) -> String {
        let mut base = String::with_capacity(self.0.len());
        for ch in self.0.chars() {
            if ch.is_alphanumeric() {
                base.push(ch);
            } else if !base.ends_with('_') {
                base.push('_');
            }
        }
        let base = base.trim_matches('_');
        if !base.is_empty() && base == self.0 {
            return base.to_string();
        }

        let digest = Sha256::digest(self.0.as_bytes());
        let tag = hex::encode(&digest[..4]);
        if base.is_empty() {
            tag
        } else {
            format!("{}_{}", base, tag)
        }
    }
}

impl fmt::Display for TopicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TopicKey {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}
