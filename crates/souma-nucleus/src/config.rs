//! Nucleus configuration.

use serde::{Deserialize, Serialize};

use crate::error::{NucleusError, Result};

/// Configuration for the nucleus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NucleusConfig {
    /// File extensions accepted for picture planets, lowercase, without dot.
    pub allowed_extensions: Vec<String>,
    /// Whether incoming vesicles must carry a valid author signature.
    pub verify_vesicles: bool,
    /// Whether published stars are also listed in the author's profile.
    pub publish_to_profile: bool,
}

impl Default for NucleusConfig {
    fn default() -> Self {
        Self {
            allowed_extensions: ["png", "jpg", "jpeg", "gif"]
                .into_iter()
                .map(String::from)
                .collect(),
            verify_vesicles: true,
            publish_to_profile: true,
        }
    }
}

impl NucleusConfig {
    /// Parse a JSON document. Missing fields take their default.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| NucleusError::Config(e.to_string()))
    }

    /// Whether `filename` carries one of the allowed extensions.
    ///
    /// Matching is case-insensitive; a name without a dot never matches.
    pub fn allows_file(&self, filename: &str) -> bool {
        let Some((_, ext)) = filename.rsplit_once('.') else {
            return false;
        };
        let ext = ext.to_ascii_lowercase();
        self.allowed_extensions.iter().any(|allowed| *allowed == ext)
    }
}
