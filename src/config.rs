use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Top-level configuration for a simulation session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the generation service (e.g. `http://localhost:8700/api/generate`).
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// API key for the generation service. When absent the scripted
    /// fallback backend is used instead of HTTP.
    pub api_key: Option<String>,
    /// Bounded timeout applied to every generation call.
    #[serde(default = "default_generation_timeout")]
    pub generation_timeout_secs: u64,

    #[serde(default)]
    pub pacing: PacingConfig,

    #[serde(default)]
    pub workspace: WorkspaceConfig,
}

/// Controls how fast the scripted timeline and fallback streams run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PacingConfig {
    /// Multiplier applied to every scripted delay. 1.0 is the stage-play
    /// cadence; 0.0 collapses all waits (used by the test suite and
    /// `--fast` runs).
    #[serde(default = "default_pacing_scale")]
    pub scale: f64,
}

/// Pixel dimensions of the canvas workspace the cursors live in.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    #[serde(default = "default_workspace_width")]
    pub width: f64,
    #[serde(default = "default_workspace_height")]
    pub height: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            api_key: None,
            generation_timeout_secs: default_generation_timeout(),
            pacing: PacingConfig::default(),
            workspace: WorkspaceConfig::default(),
        }
    }
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            scale: default_pacing_scale(),
        }
    }
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            width: default_workspace_width(),
            height: default_workspace_height(),
        }
    }
}

fn default_endpoint() -> String {
    "http://localhost:8700/api/generate".to_string()
}
fn default_generation_timeout() -> u64 {
    30
}
fn default_pacing_scale() -> f64 {
    1.0
}
fn default_workspace_width() -> f64 {
    1000.0
}
fn default_workspace_height() -> f64 {
    600.0
}

impl Config {
    /// Load configuration from a TOML file, falling back to defaults
    /// when no path is given. `COLLECTIVE_API_KEY` overrides the file.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut config = match path {
            Some(p) => {
                let content = std::fs::read_to_string(p)
                    .with_context(|| format!("Failed to read config from {}", p))?;
                toml::from_str(&content).context("Failed to parse config")?
            }
            None => Self::default(),
        };

        if let Ok(key) = std::env::var("COLLECTIVE_API_KEY") {
            if !key.is_empty() {
                config.api_key = Some(key);
            }
        }

        Ok(config)
    }

    /// Whether a real generation backend is configured.
    pub fn has_backend(&self) -> bool {
        self.api_key.is_some()
    }

    /// Scale a scripted delay (in milliseconds) by the pacing factor.
    pub fn scaled_delay_ms(&self, ms: u64) -> u64 {
        (ms as f64 * self.pacing.scale) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.endpoint.contains("/api/generate"));
        assert!(config.api_key.is_none());
        assert_eq!(config.generation_timeout_secs, 30);
        assert!((config.pacing.scale - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_parse_partial_toml() {
        let config: Config = toml::from_str(
            r#"
            endpoint = "http://example.test/gen"
            [pacing]
            scale = 0.5
            "#,
        )
        .unwrap();
        assert_eq!(config.endpoint, "http://example.test/gen");
        assert!((config.pacing.scale - 0.5).abs() < f64::EPSILON);
        // Unspecified sections fall back to defaults
        assert!((config.workspace.width - 1000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_scaled_delay() {
        let mut config = Config::default();
        config.pacing.scale = 0.0;
        assert_eq!(config.scaled_delay_ms(3000), 0);
        config.pacing.scale = 0.5;
        assert_eq!(config.scaled_delay_ms(3000), 1500);
    }

    #[test]
    fn test_has_backend() {
        let mut config = Config::default();
        assert!(!config.has_backend());
        config.api_key = Some("key".to_string());
        assert!(config.has_backend());
    }
}
