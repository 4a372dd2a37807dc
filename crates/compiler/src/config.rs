//! Compiler configuration.
//!
//! A small knob set loaded from an optional TOML file (`ifjc --config`).
//! Defaults keep the emitted IR byte-stable, so two runs over the same
//! source always produce identical output.

use crate::errors::CompileError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration for one compiler run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompilerConfig {
    /// Interleave `#` comments marking generated regions in the IR.
    ///
    /// Off by default; comments are for people reading the output, the
    /// target interpreter ignores them.
    pub comments: bool,
}

impl CompilerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, CompileError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| CompileError::Internal(format!("cannot read {}: {e}", path.display())))?;
        toml::from_str(&text)
            .map_err(|e| CompileError::Internal(format!("bad config {}: {e}", path.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn test_defaults_are_quiet() {
        assert!(!CompilerConfig::default().comments);
    }

    #[test]
    fn test_from_file_roundtrip() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "comments = true").unwrap();
        let config = CompilerConfig::from_file(file.path()).unwrap();
        assert!(config.comments);
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "optimize = 3").unwrap();
        assert!(CompilerConfig::from_file(file.path()).is_err());
    }
}
