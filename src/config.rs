//! WolfDAV Configuration
//!
//! Server settings live in a TOML file. The mounts themselves are declared
//! in a Davfile, either referenced by path or embedded inline.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use axum::http::HeaderName;

use crate::directive::parse_davfile;
use crate::error::{Error, Result};
use crate::mount::MountSpec;

/// Main WolfDAV configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WolfDavConfig {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Where the mount declarations come from
    pub mounts: MountsConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to listen on
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Request header carrying the principal authenticated upstream
    #[serde(default = "default_principal_header")]
    pub principal_header: String,
}

/// Mount declarations
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MountsConfig {
    /// Path to a Davfile
    #[serde(default)]
    pub davfile: Option<PathBuf>,

    /// Davfile text embedded in this file
    #[serde(default)]
    pub inline: Option<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_bind_address() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_principal_header() -> String {
    "X-Remote-User".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            principal_header: default_principal_header(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl WolfDavConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Load configuration from a TOML string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self> {
        let config: WolfDavConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.bind_address.is_empty() {
            return Err(Error::Config("server.bind_address cannot be empty".into()));
        }

        if HeaderName::from_bytes(self.server.principal_header.as_bytes()).is_err() {
            return Err(Error::Config(format!(
                "server.principal_header {:?} is not a valid header name",
                self.server.principal_header
            )));
        }

        match (&self.mounts.davfile, &self.mounts.inline) {
            (Some(_), Some(_)) => Err(Error::Config(
                "set only one of mounts.davfile and mounts.inline".into(),
            )),
            (None, None) => Err(Error::Config(
                "one of mounts.davfile or mounts.inline is required".into(),
            )),
            _ => Ok(()),
        }
    }

    /// The principal header as a parsed header name
    pub fn principal_header(&self) -> Result<HeaderName> {
        HeaderName::from_bytes(self.server.principal_header.as_bytes())
            .map_err(|e| Error::Config(format!("server.principal_header: {}", e)))
    }

    /// Read and parse the mount declarations
    pub fn load_mounts(&self) -> Result<Vec<MountSpec>> {
        let text = match (&self.mounts.davfile, &self.mounts.inline) {
            (_, Some(inline)) => inline.clone(),
            (Some(path), None) => std::fs::read_to_string(path).map_err(|e| {
                Error::Config(format!("cannot read Davfile {}: {}", path.display(), e))
            })?,
            (None, None) => return Err(Error::Config("no mounts configured".into())),
        };

        parse_davfile(&text)
    }
}
