mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config = parse_config(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    Ok(config)
}

/// Parse and validate configuration from a TOML string
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content)?;
    validate_config(&config)?;
    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    // Try default locations
    let default_paths = [
        "./ptsmap.toml",
        "~/.config/ptsmap/config.toml",
        "/etc/ptsmap/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            tracing::debug!("Using config file {:?}", path);
            return load_config(path);
        }
    }

    Ok(Config::default())
}

/// Validate configuration
fn validate_config(config: &Config) -> Result<()> {
    // Table settings share the engine's own validation
    config.engine_config().validate()?;

    if config.diagnostics.window < 2 {
        anyhow::bail!("diagnostics.window must be at least 2");
    }

    if !config.engine.hw_video_alias {
        tracing::warn!("hw_video_alias is disabled; hw_video checkins will be rejected");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_is_valid() {
        let config = parse_config("").unwrap();
        let engine = config.engine_config();
        assert_eq!(engine.video.resolution, 2_500);
        assert_eq!(engine.audio.resolution, 16);
        assert!(engine.hw_video_alias);
        assert!(!config.diagnostics.enabled);
        assert_eq!(config.diagnostics.window, 32);
    }

    #[test]
    fn test_partial_table_section_keeps_class_defaults() {
        let config = parse_config("[audio]\ncapacity = 128\n").unwrap();
        let engine = config.engine_config();
        assert_eq!(engine.audio.capacity, 128);
        assert_eq!(engine.audio.resolution, 16);
        assert_eq!(engine.video.capacity, 16_384);
    }

    #[test]
    fn test_rejects_zero_resolution() {
        let err = parse_config("[video]\nresolution = 0\n").unwrap_err();
        assert!(err.to_string().contains("video.resolution"));
    }

    #[test]
    fn test_rejects_tiny_window() {
        let err = parse_config("[diagnostics]\nenabled = true\nwindow = 1\n").unwrap_err();
        assert!(err.to_string().contains("window"));
    }
}
