use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::llm::LlmConfig;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub hg: HgConfig,
    /// Optional: without it the modification writer is unavailable
    #[serde(default)]
    pub llm: Option<LlmConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HgConfig {
    /// Mercurial executable, looked up on PATH unless absolute
    #[serde(default = "default_binary")]
    pub binary: String,
    /// Timeout in seconds for a single hg invocation
    #[serde(default = "default_hg_timeout")]
    pub timeout_secs: u64,
    /// How many candidate descriptions to fetch at once
    #[serde(default = "default_verify_concurrency")]
    pub verify_concurrency: usize,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3001
}

fn default_binary() -> String {
    "hg".to_string()
}

fn default_hg_timeout() -> u64 {
    10
}

fn default_verify_concurrency() -> usize {
    4
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for HgConfig {
    fn default() -> Self {
        Self {
            binary: default_binary(),
            timeout_secs: default_hg_timeout(),
            verify_concurrency: default_verify_concurrency(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Load `path` if it exists, otherwise fall back to defaults
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!("{} not found, using default configuration", path.display());
            Ok(Self::default())
        }
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.hg.binary.trim().is_empty() {
            anyhow::bail!("hg.binary must not be empty");
        }
        if self.hg.timeout_secs == 0 {
            anyhow::bail!("hg.timeout_secs must be greater than 0");
        }
        if self.hg.verify_concurrency == 0 {
            anyhow::bail!("hg.verify_concurrency must be greater than 0");
        }
        if let Some(ref llm) = self.llm {
            if llm.timeout_secs == 0 {
                anyhow::bail!("llm.timeout_secs must be greater than 0");
            }
            llm.provider.parse::<crate::llm::LlmProvider>()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[server]
port = 8080

[hg]
binary = "/usr/local/bin/hg"
timeout_secs = 20

[llm]
provider = "openai"
base_url = "https://llm.internal/v1"
api_key = "${LLM_KEY}"
model = "gpt-4o-mini"
"#;

        let config = Config::parse(toml_content).unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.hg.binary, "/usr/local/bin/hg");
        assert_eq!(config.hg.timeout_secs, 20);
        assert_eq!(config.hg.verify_concurrency, 4);

        let llm = config.llm.unwrap();
        assert_eq!(llm.provider, "openai");
        assert_eq!(llm.model, "gpt-4o-mini");
        assert_eq!(llm.max_tokens, 2000);
        assert_eq!(llm.timeout_secs, 15);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.server.port, 3001);
        assert_eq!(config.hg.binary, "hg");
        assert!(config.llm.is_none());
    }

    #[test]
    fn test_rejects_invalid_values() {
        assert!(Config::parse("[hg]\ntimeout_secs = 0\n").is_err());
        assert!(Config::parse("[hg]\nbinary = \" \"\n").is_err());
        assert!(Config::parse("[llm]\nprovider = \"bard\"\n").is_err());
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_or_default(&dir.path().join("hgtrace.toml")).unwrap();
        assert_eq!(config.hg.timeout_secs, 10);

        let path = dir.path().join("custom.toml");
        fs::write(&path, "[server]\nport = 4000\n").unwrap();
        assert_eq!(Config::load_or_default(&path).unwrap().server.port, 4000);
    }
}
