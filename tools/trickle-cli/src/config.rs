//! CLI configuration.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use trickle_core::RenderConfig;
use trickle_observability::LogConfig;

/// Config file names searched from the working directory upwards.
pub const CONFIG_NAMES: [&str; 3] = ["trickle.toml", ".trickle.toml", "trickle.json"];

/// CLI configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CliConfig {
    /// Render session settings.
    #[serde(default)]
    pub render: RenderConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LogConfig,

    /// Demo page settings.
    #[serde(default)]
    pub demo: DemoConfig,
}

impl CliConfig {
    /// Load config from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        if is_json(path) {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display()))
        } else {
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse TOML config: {}", path.display()))
        }
    }

    /// Save config to a file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = self.to_string_for(path)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))
    }

    /// Serialize in the format implied by the file extension.
    pub fn to_string_for(&self, path: &Path) -> Result<String> {
        if is_json(path) {
            Ok(serde_json::to_string_pretty(self)?)
        } else {
            Ok(toml::to_string_pretty(self)?)
        }
    }
}

pub fn is_json(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "json")
}

/// Settings for the built-in demo page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DemoConfig {
    /// Base delay between section resolutions, in milliseconds.
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,

    /// Resolve the reviews section with an error.
    #[serde(default)]
    pub fail_reviews: bool,
}

fn default_delay_ms() -> u64 {
    150
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            delay_ms: default_delay_ms(),
            fail_reviews: false,
        }
    }
}

/// Generate a default trickle.toml config file.
pub fn generate_default_config() -> String {
    r#"# Trickle configuration

[render]
# "streaming" patches slots in as they resolve, "blocking" waits inline
mode = "streaming"

[render.flush]
# "at_markers", "eager", or "threshold" (with bytes = N)
kind = "at_markers"

[render.markup]
attribute = "data-trickle-cid"
container_tag = "div"
swap_function = "trickleSwap"

[logging]
# trace, debug, info, warn, error; RUST_LOG overrides
level = "info"
# "human" or "json"
format = "human"

[demo]
delay_ms = 150
fail_reviews = false
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use trickle_core::{FlushPolicy, RenderMode};
    use trickle_observability::{LogFormat, LogLevel};

    use super::*;

    #[test]
    fn test_default_config_parses() {
        let config: CliConfig = toml::from_str(&generate_default_config()).unwrap();

        assert_eq!(config, CliConfig::default());
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: CliConfig = toml::from_str(
            r#"
[render]
mode = "blocking"

[render.flush]
kind = "threshold"
bytes = 512

[logging]
format = "json"
"#,
        )
        .unwrap();

        assert_eq!(config.render.mode, RenderMode::Blocking);
        assert_eq!(config.render.flush, FlushPolicy::Threshold { bytes: 512 });
        assert_eq!(config.render.markup.attribute, "data-trickle-cid");
        assert_eq!(config.logging.level, LogLevel::Info);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.demo.delay_ms, 150);
    }

    #[test]
    fn test_json_config() {
        let config: CliConfig =
            serde_json::from_str(r#"{"demo": {"delay_ms": 5, "fail_reviews": true}}"#).unwrap();

        assert_eq!(
            config.demo,
            DemoConfig {
                delay_ms: 5,
                fail_reviews: true
            }
        );
        assert!(config.render.is_streaming());
    }

    #[test]
    fn test_format_follows_extension() {
        let config = CliConfig::default();

        let json = config.to_string_for(Path::new("trickle.json")).unwrap();
        assert!(json.trim_start().starts_with('{'));

        let toml = config.to_string_for(Path::new("trickle.toml")).unwrap();
        assert!(toml.contains("[render]"));
    }
}
