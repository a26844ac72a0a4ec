//! Command-line parsing and validation helpers.

use anyhow::{bail, Result};
use clap::Parser;
use std::{env, path::PathBuf};

pub const DEFAULT_BACKEND: &str = "http://127.0.0.1:5000";

/// Environment variable carrying the startup defaults JSON when the panel is
/// launched by a wrapper that already knows the projector address.
pub const DEFAULTS_ENV_VAR: &str = "BENQCTL_DEFAULTS";

const MAX_BACKEND_URL_BYTES: usize = 2048;

/// CLI options for the control panel. Validated values keep the dispatcher's
/// request URLs well-formed.
#[derive(Debug, Parser, Clone)]
#[command(about = "Terminal control panel for BenQ projectors", author, version)]
pub struct AppConfig {
    /// Base URL of the backend API
    #[arg(long, default_value = DEFAULT_BACKEND)]
    pub backend: String,

    /// Startup defaults as JSON, e.g. '{"ip":"192.168.1.5","port":8000}'
    #[arg(long, value_name = "JSON")]
    pub defaults: Option<String>,

    /// Directory for the persistent configuration store
    #[arg(long, value_name = "DIR")]
    pub config_dir: Option<PathBuf>,

    /// Print the known preset keys and exit
    #[arg(long, default_value_t = false)]
    pub list_presets: bool,

    /// Enable verbose timing logs
    #[arg(long)]
    pub log_timings: bool,
}

impl AppConfig {
    /// Parse CLI arguments and validate them right away.
    pub fn parse_args() -> Result<Self> {
        let mut config = Self::parse();
        config.validate()?;
        Ok(config)
    }

    /// Check CLI values and normalize the backend URL.
    pub(crate) fn validate(&mut self) -> Result<()> {
        let trimmed = self.backend.trim();
        if trimmed.is_empty() {
            bail!("--backend cannot be empty");
        }
        if trimmed.len() > MAX_BACKEND_URL_BYTES {
            bail!("--backend exceeds {MAX_BACKEND_URL_BYTES} bytes");
        }
        if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
            bail!("--backend must be an http:// or https:// URL, got '{trimmed}'");
        }
        if trimmed.chars().any(|ch| ch.is_whitespace() || ch.is_control()) {
            bail!("--backend must not contain whitespace or control characters");
        }
        // The dispatcher appends "/api/..." itself.
        self.backend = trimmed.trim_end_matches('/').to_string();

        // --defaults is deliberately not validated here: a malformed value is
        // recovered silently at bootstrap with the hardcoded fallback.
        Ok(())
    }

    /// Startup defaults JSON from the CLI flag, falling back to the
    /// environment variable set by wrapper scripts.
    pub fn startup_defaults_json(&self) -> Option<String> {
        self.defaults
            .clone()
            .or_else(|| env::var(DEFAULTS_ENV_VAR).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn accepts_valid_defaults() {
        let mut cfg = AppConfig::parse_from(["test-app"]);
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.backend, DEFAULT_BACKEND);
    }

    #[test]
    fn rejects_empty_backend() {
        let mut cfg = AppConfig::parse_from(["test-app", "--backend", "  "]);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_non_http_backend() {
        let mut cfg = AppConfig::parse_from(["test-app", "--backend", "ftp://projector"]);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_backend_with_embedded_whitespace() {
        let mut cfg = AppConfig::parse_from(["test-app", "--backend", "http://a b"]);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn strips_trailing_slash_from_backend() {
        let mut cfg = AppConfig::parse_from(["test-app", "--backend", "http://10.0.0.4:5000/"]);
        cfg.validate().unwrap();
        assert_eq!(cfg.backend, "http://10.0.0.4:5000");
    }

    #[test]
    fn malformed_defaults_flag_is_accepted_by_validation() {
        let mut cfg = AppConfig::parse_from(["test-app", "--defaults", "{broken"]);
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.startup_defaults_json().as_deref(), Some("{broken"));
    }
}
