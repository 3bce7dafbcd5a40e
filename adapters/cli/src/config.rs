//! Session configuration loading.

use std::{fs, path::Path};

use anyhow::{Context, Result};
use gabor_hunt_core::SessionConfig;

/// Loads and validates the session configuration at `path`, or the defaults when absent.
pub(crate) fn load(path: Option<&Path>) -> Result<SessionConfig> {
    let Some(path) = path else {
        let config = SessionConfig::default();
        config.validate().context("built-in defaults are invalid")?;
        return Ok(config);
    };

    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read session config at {}", path.display()))?;
    parse(&contents).with_context(|| format!("invalid session config {}", path.display()))
}

/// Parses TOML contents into a validated configuration.
pub(crate) fn parse(contents: &str) -> Result<SessionConfig> {
    let config: SessionConfig =
        toml::from_str(contents).context("failed to parse session config toml contents")?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_path_yields_defaults() {
        let config = load(None).expect("defaults");
        assert_eq!(config, SessionConfig::default());
    }

    #[test]
    fn overrides_merge_with_defaults() {
        let config = parse(
            r##"
            patch_size = 120
            background_color = "#404040"
            active_mode = "drift"
            "##,
        )
        .expect("valid config");
        assert_eq!(config.patch_size, 120);
        assert_eq!(config.max_concurrent, SessionConfig::default().max_concurrent);
        assert!(config.active_overrides().is_some());
    }

    #[test]
    fn structural_errors_are_reported() {
        let error = parse("patch_size = 4").expect_err("undersized patch");
        assert!(format!("{error:#}").contains("stimulus size"), "{error:#}");
    }

    #[test]
    fn unreadable_files_mention_the_path() {
        let error = load(Some(Path::new("/definitely/not/here.toml"))).expect_err("missing file");
        assert!(error.to_string().contains("/definitely/not/here.toml"));
    }
}
