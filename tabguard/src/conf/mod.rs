use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use rust_embed::RustEmbed;
use serde::Deserialize;
use std::path::PathBuf;

#[derive(RustEmbed)]
#[folder = "src/conf/"]
#[include = "*.toml"]
struct EmbeddedConfigFS;

const DEFAULT_CONFIG_FILE: &str = "default_config.toml";
const ENV_PREFIX: &str = "TABGUARD_";

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct General {
    pub log_level: String,
    pub log_format: LogFormat,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Storage {
    pub path: String,

    /// In seconds.
    pub busy_timeout: u64,

    pub seed_default_roles: bool,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub general: General,
    pub storage: Storage,
}

impl Config {
    /// returns a correctly deserialized config struct from the embedded defaults, the first config file found and
    /// finally the environment.
    ///
    /// Later sources override earlier ones key by key. Env vars look like `TABGUARD_STORAGE__PATH`.
    pub fn load(path_override: Option<&str>) -> anyhow::Result<Self> {
        let default_config = EmbeddedConfigFS::get(DEFAULT_CONFIG_FILE)
            .ok_or_else(|| anyhow::anyhow!("embedded config '{DEFAULT_CONFIG_FILE}' is missing"))?;
        let default_config = std::str::from_utf8(&default_config.data)?.to_string();

        let mut figment = Figment::new().merge(Toml::string(&default_config));

        match path_override {
            // A path the user asked for explicitly has to exist.
            Some(path) => {
                if !PathBuf::from(path).exists() {
                    anyhow::bail!("config file '{path}' does not exist");
                }
                figment = figment.merge(Toml::file(path));
            }
            None => {
                for path in config_paths() {
                    figment = figment.merge(Toml::file(path));
                }
            }
        }

        let config = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;

        Ok(config)
    }
}

/// returns the default configuration paths that are searched in case user does not specify.
fn config_paths() -> Vec<PathBuf> {
    match dirs::home_dir() {
        Some(home) => vec![home.join(".config").join("tabguard.toml")],
        None => vec![],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;
    use pretty_assertions::assert_eq;

    #[test]
    fn embedded_defaults() {
        Jail::expect_with(|jail| {
            jail.set_env("HOME", jail.directory().display().to_string());

            let config = Config::load(None).expect("defaults should parse");
            assert_eq!(config.general.log_level, "info");
            assert_eq!(config.general.log_format, LogFormat::Pretty);
            assert_eq!(config.storage.busy_timeout, 5);
            assert!(config.storage.seed_default_roles);

            Ok(())
        });
    }

    #[test]
    fn file_then_env_override() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "tabguard.toml",
                r#"
                [general]
                log_format = "json"

                [storage]
                path = "/var/lib/tabguard/app.db"
                seed_default_roles = false
                "#,
            )?;
            jail.set_env("TABGUARD_STORAGE__PATH", "/srv/tabguard.db");
            jail.set_env("TABGUARD_GENERAL__LOG_LEVEL", "debug");

            let path = jail.directory().join("tabguard.toml");
            let config = Config::load(Some(&path.display().to_string())).expect("config should parse");

            assert_eq!(config.general.log_level, "debug");
            assert_eq!(config.general.log_format, LogFormat::Json);
            assert_eq!(config.storage.path, "/srv/tabguard.db");
            assert_eq!(config.storage.busy_timeout, 5);
            assert!(!config.storage.seed_default_roles);

            Ok(())
        });
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        Jail::expect_with(|jail| {
            let path = jail.directory().join("nope.toml");
            assert!(Config::load(Some(&path.display().to_string())).is_err());

            Ok(())
        });
    }
}
