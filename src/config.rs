//! CLI argument parsing and on-disk configuration (§6 Configuration).
//!
//! Mirrors the teacher's config layering: `clap` parses the command line,
//! an optional JSON file on disk is loaded as a `FileConfig`, and CLI flags
//! on `ConvertLikeArgs` override what a config file would otherwise supply.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

/// Which source format to treat an input as; `Auto` infers from extension/content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    Rdf,
    Dtdl,
    Cdm,
    Auto,
}

#[derive(Debug, Parser)]
#[command(name = "fabric-ontology", about = "RDF/DTDL/CDM to Fabric ontology converter", version)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Command,

    #[arg(long, global = true, value_name = "FILE", help = "Path to a JSON configuration file")]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Validate an input without converting or uploading it.
    Validate(ConvertLikeArgs),
    /// Convert an input to a Fabric ontology bundle.
    Convert(ConvertLikeArgs),
    /// Convert and upload the result to a Fabric workspace.
    Upload(ConvertLikeArgs),
    /// Export a Fabric bundle back to Turtle.
    Export {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        output: PathBuf,
    },
    /// List ontologies in a Fabric workspace.
    List,
    /// Get one ontology's metadata.
    Get { id: String },
    /// Delete an ontology.
    Delete { id: String },
    /// Run the conversion pipeline against a fixture without network access.
    Test(ConvertLikeArgs),
    /// Compare two previously converted ontologies.
    Compare { left: PathBuf, right: PathBuf },
}

#[derive(Debug, Clone, Parser)]
pub struct ConvertLikeArgs {
    #[arg(long)]
    pub input: PathBuf,

    #[arg(long, value_enum, default_value = "auto")]
    pub format: SourceFormat,

    #[arg(long)]
    pub output: Option<PathBuf>,

    #[arg(long)]
    pub streaming: bool,

    #[arg(long)]
    pub force: bool,

    #[arg(long)]
    pub dry_run: bool,

    #[arg(long)]
    pub recursive: bool,

    #[arg(long)]
    pub allow_relative_up: bool,
}

/// Rate-limiter settings under `fabric.rate_limit` (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub requests_per_minute: u32,
    pub burst: Option<u32>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            requests_per_minute: 10,
            burst: None,
        }
    }
}

/// Circuit-breaker settings under `fabric.circuit_breaker` (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerSettings {
    pub enabled: bool,
    pub failure_threshold: u32,
    pub recovery_timeout: u64,
    pub success_threshold: u32,
}

impl Default for CircuitBreakerSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            failure_threshold: 5,
            recovery_timeout: 60,
            success_threshold: 2,
        }
    }
}

/// `fabric.*` settings (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FabricConfig {
    pub workspace_id: String,
    pub api_base_url: String,
    pub tenant_id: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub use_interactive_auth: bool,
    pub rate_limit: RateLimitConfig,
    pub circuit_breaker: CircuitBreakerSettings,
}

impl Default for FabricConfig {
    fn default() -> Self {
        Self {
            workspace_id: String::new(),
            api_base_url: "https://api.fabric.microsoft.com/v1".to_string(),
            tenant_id: None,
            client_id: None,
            client_secret: None,
            use_interactive_auth: false,
            rate_limit: RateLimitConfig::default(),
            circuit_breaker: CircuitBreakerSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormatConfig {
    Json,
    Pretty,
}

/// Log rotation settings under `logging.rotation` (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RotationConfig {
    pub enabled: bool,
    pub max_mb: u64,
    pub backup_count: u32,
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_mb: 50,
            backup_count: 5,
        }
    }
}

/// `logging.*` settings (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
    pub file: Option<PathBuf>,
    pub format: LogFormatConfig,
    pub rotation: RotationConfig,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            format: LogFormatConfig::Pretty,
            rotation: RotationConfig::default(),
        }
    }
}

/// `ontology.*` settings (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OntologySettings {
    pub id_prefix: u64,
}

impl Default for OntologySettings {
    fn default() -> Self {
        Self {
            id_prefix: 1_000_000_000_000,
        }
    }
}

/// The fully merged configuration file shape.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    pub fabric: FabricConfig,
    pub logging: LoggingSettings,
    pub ontology: OntologySettings,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {path:?}"))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse JSON config {path:?}"))
    }

    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            self.fabric.rate_limit.requests_per_minute > 0,
            "fabric.rate_limit.requests_per_minute must be positive"
        );
        anyhow::ensure!(
            self.fabric.circuit_breaker.failure_threshold > 0,
            "fabric.circuit_breaker.failure_threshold must be positive"
        );
        anyhow::ensure!(
            self.ontology.id_prefix > 0,
            "ontology.id_prefix must be positive"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = FileConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.fabric.api_base_url, "https://api.fabric.microsoft.com/v1");
        assert_eq!(config.ontology.id_prefix, 1_000_000_000_000);
    }

    #[test]
    fn rejects_zero_rate_limit() {
        let mut config = FileConfig::default();
        config.fabric.rate_limit.requests_per_minute = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn loads_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{"fabric": {"workspace_id": "ws-1", "api_base_url": "https://api.fabric.microsoft.com/v1"}}"#,
        )
        .unwrap();

        let config = FileConfig::load(&path).unwrap();
        assert_eq!(config.fabric.workspace_id, "ws-1");
    }
}
