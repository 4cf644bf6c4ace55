//! Configuration for cidlens.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (CIDLENS_HOME, CIDLENS_PROVIDER, CIDLENS_MODEL,
//!    CIDLENS_ENDPOINT_URL, CIDLENS_CATALOG)
//! 2. Config file (.cidlens/config.yaml)
//! 3. Defaults (~/.cidlens, Hugging Face dedicated endpoint)
//!
//! Secrets (OPENAI_API_KEY, HF_TOKEN) are only read from the environment.
//!
//! Config file discovery:
//! - Searches current directory and parents for .cidlens/config.yaml
//! - `paths.home` is relative to the .cidlens/ directory, other paths to the
//!   project root (the parent of .cidlens/)

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::adapters::{openai, ProviderKind};
use crate::core::SafetyLimits;

/// Fine-tuned Llama-3 model for Brazilian ICD-10 coding
pub const DEFAULT_HF_MODEL: &str = "ricardosantoss/CodexAI-Llama-3-8B-CID10";

/// Default bind address for `cidlens serve`
pub const DEFAULT_SERVER_ADDRESS: &str = "127.0.0.1:3000";

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub safety: Option<SafetyLimits>,
    #[serde(default)]
    pub server: Option<ServerConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProviderConfig {
    pub kind: Option<ProviderKind>,
    pub model: Option<String>,
    pub endpoint_url: Option<String>,
    pub base_url: Option<String>,
    pub temperature: Option<f64>,
    pub max_new_tokens: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// State directory (relative to .cidlens/)
    pub home: Option<String>,
    /// CID catalog JSON (relative to project root)
    pub catalog: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub address: Option<String>,
}

/// Resolved provider selection and credentials
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderSettings {
    pub kind: ProviderKind,
    pub model: Option<String>,
    pub endpoint_url: Option<String>,
    /// Override for the provider's API host (OpenAI or shared inference)
    pub base_url: Option<String>,
    pub temperature: Option<f64>,
    pub max_new_tokens: u32,
    /// OPENAI_API_KEY or HF_TOKEN, depending on `kind`
    pub api_key: Option<String>,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            kind: ProviderKind::default(),
            model: None,
            endpoint_url: None,
            base_url: None,
            temperature: None,
            max_new_tokens: 500,
            api_key: None,
        }
    }
}

impl ProviderSettings {
    /// Configured model, or the provider's default
    pub fn model_or_default(&self) -> String {
        match (&self.model, self.kind) {
            (Some(model), _) => model.clone(),
            (None, ProviderKind::OpenAi) => openai::DEFAULT_MODEL.to_string(),
            (None, _) => DEFAULT_HF_MODEL.to_string(),
        }
    }

    /// Configured temperature, or the provider's default
    pub fn temperature_or_default(&self) -> f64 {
        self.temperature.unwrap_or(match self.kind {
            ProviderKind::OpenAi => 0.0,
            ProviderKind::HfInference => 0.1,
            ProviderKind::HfEndpoint => 0.01,
        })
    }

    /// Environment variable holding the secret for this provider
    pub fn secret_env_var(kind: ProviderKind) -> &'static str {
        match kind {
            ProviderKind::OpenAi => "OPENAI_API_KEY",
            ProviderKind::HfInference | ProviderKind::HfEndpoint => "HF_TOKEN",
        }
    }
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Absolute path to cidlens home (feedback log, default catalog)
    pub home: PathBuf,
    /// Path to the CID catalog JSON
    pub catalog: PathBuf,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
    pub provider: ProviderSettings,
    pub safety: SafetyLimits,
    pub server_address: String,
}

impl ResolvedConfig {
    /// Path of the clinician feedback log
    pub fn feedback_path(&self) -> PathBuf {
        self.home.join("feedback.jsonl")
    }
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(".cidlens").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to `base`
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
            .canonicalize()
            .unwrap_or_else(|_| base.join(path_str))
    }
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    load_config_with(find_config_file(), |key| std::env::var(key).ok())
}

/// Load configuration from an optional config file and an environment lookup
fn load_config_with(
    config_file: Option<PathBuf>,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<ResolvedConfig> {
    // Empty variables count as unset
    let env = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    let default_home = dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(".cidlens");

    let file = match config_file {
        Some(ref path) => Some(load_config_file(path)?),
        None => None,
    };

    // .cidlens/ and the project root above it
    let cidlens_dir = config_file.as_ref().and_then(|p| p.parent());
    let base_dir = cidlens_dir.and_then(|p| p.parent()).unwrap_or(Path::new("."));

    let home = if let Some(env_home) = env("CIDLENS_HOME") {
        PathBuf::from(env_home)
    } else if let (Some(dir), Some(home_path)) = (
        cidlens_dir,
        file.as_ref().and_then(|f| f.paths.home.as_deref()),
    ) {
        resolve_path(dir, home_path)
    } else {
        default_home
    };

    let catalog = if let Some(env_catalog) = env("CIDLENS_CATALOG") {
        PathBuf::from(env_catalog)
    } else if let Some(catalog_path) = file.as_ref().and_then(|f| f.paths.catalog.as_deref()) {
        resolve_path(base_dir, catalog_path)
    } else {
        home.join("cids.json")
    };

    let provider_file = file
        .as_ref()
        .map(|f| f.provider.clone())
        .unwrap_or_default();

    let kind = match env("CIDLENS_PROVIDER") {
        Some(value) => value
            .parse::<ProviderKind>()
            .map_err(anyhow::Error::msg)
            .context("Invalid CIDLENS_PROVIDER")?,
        None => provider_file.kind.unwrap_or_default(),
    };

    let provider = ProviderSettings {
        kind,
        model: env("CIDLENS_MODEL").or(provider_file.model),
        endpoint_url: env("CIDLENS_ENDPOINT_URL").or(provider_file.endpoint_url),
        base_url: provider_file.base_url,
        temperature: provider_file.temperature,
        max_new_tokens: provider_file.max_new_tokens.unwrap_or(500),
        api_key: env(ProviderSettings::secret_env_var(kind)),
    };

    let safety = file
        .as_ref()
        .and_then(|f| f.safety.clone())
        .unwrap_or_default();

    let server_address = file
        .as_ref()
        .and_then(|f| f.server.as_ref())
        .and_then(|s| s.address.clone())
        .unwrap_or_else(|| DEFAULT_SERVER_ADDRESS.to_string());

    Ok(ResolvedConfig {
        home,
        catalog,
        config_file,
        provider,
        safety,
        server_address,
    })
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| format!("{:#}", e)));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}
