use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cache::RetryPolicy;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub service: ServiceConfig,
  #[serde(default)]
  pub cache: CacheConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
  /// Base URL of the SPP service, e.g. "https://spp.example.org/"
  pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  /// Seconds before a cached query result is considered stale
  pub stale_secs: u64,
  pub retry: RetryConfig,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      stale_secs: 300,
      retry: RetryConfig::default(),
    }
  }
}

/// Retry settings for read fetches. Mutations are never retried.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
  pub max_attempts: u32,
  pub base_delay_ms: u64,
  pub max_delay_ms: u64,
}

impl Default for RetryConfig {
  fn default() -> Self {
    Self {
      max_attempts: 3,
      base_delay_ms: 500,
      max_delay_ms: 5000,
    }
  }
}

impl CacheConfig {
  pub fn stale_time(&self) -> Duration {
    Duration::from_secs(self.stale_secs)
  }

  pub fn retry_policy(&self) -> RetryPolicy {
    RetryPolicy {
      max_attempts: self.retry.max_attempts.max(1),
      base_delay: Duration::from_millis(self.retry.base_delay_ms),
      max_delay: Duration::from_millis(self.retry.max_delay_ms),
    }
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./sppctl.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/sppctl/config.yaml
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Err(eyre!(
        "No configuration file found. Create one at ~/.config/sppctl/config.yaml\n\
                 with at least a service url entry."
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("sppctl.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("sppctl").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    let config: Config = serde_yaml::from_str(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))?;

    Ok(config)
  }

  /// Get the service API token from environment variables.
  ///
  /// Checks SPPCTL_API_TOKEN first, then SPP_API_TOKEN as fallback.
  pub fn get_api_token() -> Result<String> {
    std::env::var("SPPCTL_API_TOKEN")
      .or_else(|_| std::env::var("SPP_API_TOKEN"))
      .map_err(|_| {
        eyre!("Service API token not found. Set SPPCTL_API_TOKEN or SPP_API_TOKEN environment variable.")
      })
  }
}
