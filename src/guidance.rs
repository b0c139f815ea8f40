//! Therapeutic guidance corpus
//!
//! The curated guidance text that grounds every companion system prompt.
//! Loaded exactly once at process start and passed to the service as an
//! explicit dependency; a missing or unreadable file is a construction-time
//! error, not a silent fallback.

use anyhow::{Context, Result};
use std::path::Path;

pub struct Guidance {
    text: String,
}

impl Guidance {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading guidance corpus from {}", path.display()))?;
        if text.trim().is_empty() {
            anyhow::bail!("guidance corpus at {} is empty", path.display());
        }
        Ok(Self { text })
    }

    #[cfg(test)]
    pub fn from_text(text: &str) -> Self {
        Self {
            text: text.to_string(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_missing_file_fails() {
        let err = Guidance::load(Path::new("/nonexistent/guidance.md"));
        assert!(err.is_err());
    }

    #[test]
    fn test_load_empty_file_fails() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "   \n").unwrap();
        assert!(Guidance::load(file.path()).is_err());
    }

    #[test]
    fn test_load_reads_text() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "Always validate feelings first.").unwrap();
        let guidance = Guidance::load(file.path()).unwrap();
        assert!(guidance.text().contains("validate feelings"));
    }
}
