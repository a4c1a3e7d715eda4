use serde::{Deserialize, Serialize};

/// Corpus scan policy for a [`crate::vault::LocalVault`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultConfig {
    /// Lowercase file extensions treated as documents.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    /// Scan dot-prefixed files and directories too. The state directory is
    /// always skipped regardless of this flag.
    #[serde(default)]
    pub include_hidden: bool,
    /// Relative-path glob patterns excluded from the scan.
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    /// Directory under the vault root holding taskvault's own files
    /// (settings, never documents).
    #[serde(default = "default_state_dir")]
    pub state_dir: String,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            extensions: default_extensions(),
            include_hidden: false,
            exclude_globs: Vec::new(),
            state_dir: default_state_dir(),
        }
    }
}

fn default_extensions() -> Vec<String> {
    vec![
        "md".to_string(),
        "markdown".to_string(),
        "txt".to_string(),
    ]
}

fn default_state_dir() -> String {
    ".taskvault".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_markdown_and_plain_text() {
        let config = VaultConfig::default();
        assert_eq!(config.extensions, vec!["md", "markdown", "txt"]);
        assert!(!config.include_hidden);
        assert_eq!(config.state_dir, ".taskvault");
    }

    #[test]
    fn partial_json_fills_in_defaults() {
        let config: VaultConfig =
            serde_json::from_str(r#"{"include_hidden":true}"#).expect("deserialize");
        assert!(config.include_hidden);
        assert_eq!(config.extensions, vec!["md", "markdown", "txt"]);
    }
}
