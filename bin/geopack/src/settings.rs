use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use geopack_deploy::{CONFIG_FILENAME, Config};

/// Environment variables owned by the CLI rather than the config file.
const CLI_ENV_KEYS: [&str; 4] = ["verbosity", "config", "private_key", "from"];

/// Layer defaults, the TOML file and `GEOPACK_` environment variables.
///
/// An explicit `path` must exist. Without one, `./GeoPack.toml` is used when
/// present.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let file = match path {
        Some(path) if path.is_dir() => Some(path.join(CONFIG_FILENAME)),
        Some(path) => Some(path.to_path_buf()),
        None => Some(PathBuf::from(CONFIG_FILENAME)).filter(|p| p.exists()),
    };

    let mut figment = Figment::from(Serialized::defaults(Config::default()));
    if let Some(file) = &file {
        if !file.exists() {
            anyhow::bail!("Configuration file not found: {}", file.display());
        }
        tracing::debug!(path = %file.display(), "Loading configuration file");
        figment = figment.merge(Toml::file(file));
    }

    figment
        .merge(
            Env::prefixed("GEOPACK_")
                .split("__")
                .ignore(&CLI_ENV_KEYS),
        )
        .extract()
        .context("Failed to load configuration")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn test_explicit_missing_file_is_an_error() {
        let err = load_config(Some(Path::new("/nonexistent/GeoPack.toml"))).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_file_values_override_defaults() {
        let dir = TempDir::new("geopack-settings").unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILENAME),
            r#"
            [marketplace]
            api_key = "test-key"

            [contracts]
            factory = "0x1111111111111111111111111111111111111111"

            [economics]
            mythic_offer = 42
            "#,
        )
        .unwrap();

        let config = load_config(Some(dir.path())).unwrap();
        assert_eq!(config.marketplace.api_key, "test-key");
        assert_eq!(config.economics.mythic_offer, 42);
        assert_eq!(config.economics.common_offer, 20_000);
        assert_eq!(config.chain.chain_id, 8453);
        assert!(config.validate().is_ok());
    }
}
