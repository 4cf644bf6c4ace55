//! ICD-10 code descriptions.
//!
//! Loaded from a `cids.json` file mapping code to description:
//!
//! ```json
//! { "I10": "Hipertensão essencial (primária)", "O24.4": "Diabetes mellitus que surge durante a gravidez" }
//! ```

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use tokio::fs;
use tracing::{info, warn};

/// Label used when a code is not in the catalog
pub const UNKNOWN_DESCRIPTION: &str = "Descrição não encontrada";

/// Code → description lookup table
#[derive(Debug, Clone, Default)]
pub struct CidCatalog {
    descriptions: HashMap<String, String>,
}

impl CidCatalog {
    /// Create an empty catalog (every lookup falls back)
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a catalog from JSON text
    pub fn from_json(content: &str) -> Result<Self> {
        let raw: HashMap<String, String> =
            serde_json::from_str(content).context("Failed to parse CID catalog JSON")?;

        let descriptions = raw
            .into_iter()
            .map(|(code, description)| (normalize_code(&code), description))
            .collect();

        Ok(Self { descriptions })
    }

    /// Load the catalog from disk
    ///
    /// A missing file yields an empty catalog; an unreadable or invalid one
    /// is an error.
    pub async fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!(path = %path.display(), "CID catalog not found, descriptions unavailable");
            return Ok(Self::new());
        }

        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read CID catalog: {}", path.display()))?;

        let catalog = Self::from_json(&content)
            .with_context(|| format!("Invalid CID catalog: {}", path.display()))?;

        info!(codes = catalog.len(), "CID catalog loaded");
        Ok(catalog)
    }

    /// Description of a code, if known
    pub fn get(&self, code: &str) -> Option<&str> {
        self.descriptions.get(&normalize_code(code)).map(String::as_str)
    }

    /// Description of a code, or the fallback label
    pub fn describe(&self, code: &str) -> &str {
        self.get(code).unwrap_or(UNKNOWN_DESCRIPTION)
    }

    pub fn len(&self) -> usize {
        self.descriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptions.is_empty()
    }
}

fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}
