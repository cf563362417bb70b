//! Configuration file loading.

use std::path::Path;

use tracing::warn;

use adrecon_types::{AdreconError, AppConfig};

/// Load and validate the TOML configuration at `path`.
///
/// Unknown keys warn instead of failing so an operator typo never takes the
/// pipeline down; structural and semantic problems are fatal with exit
/// code 2.
///
/// # Errors
/// [`AdreconError::Config`] when the file is missing, unparseable, or
/// fails validation.
pub fn load(path: impl AsRef<Path>) -> Result<AppConfig, AdreconError> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path).map_err(|e| {
        AdreconError::config(format!("cannot read config {}: {e}", path.display()))
    })?;
    let config: AppConfig = toml::from_str(&raw)
        .map_err(|e| AdreconError::config(format!("malformed config {}: {e}", path.display())))?;

    for key in config.unknown_keys() {
        warn!(key, "unrecognized configuration key ignored");
    }
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_config_error() {
        let err = load("definitely/not/here.toml").unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn malformed_toml_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "mediator = [[[").unwrap();
        let err = load(&path).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn valid_file_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[mediator]\napi_key = \"k\"\npackage_name = \"com.example.app\"\n",
        )
        .unwrap();
        let config = load(&path).unwrap();
        assert_eq!(config.mediator.api_key, "k");
    }
}
