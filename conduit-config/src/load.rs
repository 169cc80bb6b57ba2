use std::io;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::environment::Environment;

/// Directory searched by [`load_config`], relative to the working directory.
const CONFIGURATION_DIR: &str = "configuration";

/// Stem of the configuration file every deployment provides.
const BASE_FILE_STEM: &str = "base";

/// Prefix of environment variables overriding file values.
const ENV_PREFIX: &str = "APP";

/// Separator between nested keys in environment variable names.
const ENV_SEPARATOR: &str = "__";

/// Errors returned while assembling a configuration.
#[derive(Debug, Error)]
pub enum LoadConfigError {
    #[error("failed to determine the current directory: {0}")]
    CurrentDir(#[source] io::Error),

    #[error("configuration directory `{0}` does not exist")]
    MissingConfigurationDirectory(PathBuf),

    #[error("failed to determine runtime environment: {0}")]
    Environment(#[from] io::Error),

    #[error("failed to load configuration: {0}")]
    Config(#[from] config::ConfigError),
}

/// Loads a configuration from the `configuration` directory of the working directory.
pub fn load_config<T>() -> Result<T, LoadConfigError>
where
    T: DeserializeOwned,
{
    let working_directory = std::env::current_dir().map_err(LoadConfigError::CurrentDir)?;
    load_config_from_directory(&working_directory.join(CONFIGURATION_DIR))
}

/// Loads a configuration from `configuration_directory`.
///
/// Sources are merged in order, later ones winning:
/// 1. `base.(yaml|yml|json)`, required.
/// 2. `{environment}.(yaml|yml|json)` where the environment comes from `APP_ENVIRONMENT`,
///    optional.
/// 3. `APP_`-prefixed environment variables, nested keys separated by `__`
///    (`APP_POOL__NUM_WORKERS=8`).
///
/// Fields missing from every source keep their serde defaults.
pub fn load_config_from_directory<T>(configuration_directory: &Path) -> Result<T, LoadConfigError>
where
    T: DeserializeOwned,
{
    if !configuration_directory.is_dir() {
        return Err(LoadConfigError::MissingConfigurationDirectory(
            configuration_directory.to_path_buf(),
        ));
    }

    let environment = Environment::load()?;

    let settings = config::Config::builder()
        .add_source(config::File::from(
            configuration_directory.join(BASE_FILE_STEM),
        ))
        .add_source(
            config::File::from(configuration_directory.join(environment.as_str()))
                .required(false),
        )
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator(ENV_SEPARATOR)
                .try_parsing(true),
        )
        .build()?;

    Ok(settings.try_deserialize()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::{ConduitConfig, WorkerPoolConfig};
    use std::time::{SystemTime, UNIX_EPOCH};

    fn scratch_directory(name: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let directory = std::env::temp_dir().join(format!(
            "conduit-config-{name}-{}-{nanos}",
            std::process::id()
        ));
        std::fs::create_dir_all(&directory).unwrap();
        directory
    }

    #[test]
    fn missing_directory_is_reported() {
        let directory = std::env::temp_dir().join("conduit-config-does-not-exist");
        let err = load_config_from_directory::<ConduitConfig>(&directory).unwrap_err();
        assert!(matches!(
            err,
            LoadConfigError::MissingConfigurationDirectory(_)
        ));
    }

    #[test]
    fn missing_base_file_is_an_error() {
        let directory = scratch_directory("missing-base");

        let err = load_config_from_directory::<ConduitConfig>(&directory).unwrap_err();
        assert!(matches!(err, LoadConfigError::Config(_)));

        std::fs::remove_dir_all(directory).unwrap();
    }

    #[test]
    fn base_file_alone_is_enough() {
        let directory = scratch_directory("base-only");
        std::fs::write(directory.join("base.yaml"), "pool:\n  num_workers: 2\n").unwrap();

        let config = load_config_from_directory::<ConduitConfig>(&directory).unwrap();
        assert_eq!(config.pool.num_workers, 2);
        assert_eq!(config.pool.name, WorkerPoolConfig::DEFAULT_NAME);
        assert_eq!(config.max_in_flight, ConduitConfig::DEFAULT_MAX_IN_FLIGHT);

        std::fs::remove_dir_all(directory).unwrap();
    }

    #[test]
    fn environment_file_overrides_base_file() {
        let directory = scratch_directory("override");
        std::fs::write(
            directory.join("base.yaml"),
            "pool:\n  name: ingest\n  num_workers: 2\ncache:\n  ttl_ms: 250\n",
        )
        .unwrap();
        let environment = Environment::load().unwrap();
        std::fs::write(
            directory.join(format!("{environment}.json")),
            r#"{ "pool": { "num_workers": 8 } }"#,
        )
        .unwrap();

        let config = load_config_from_directory::<ConduitConfig>(&directory).unwrap();
        assert_eq!(config.pool.name, "ingest");
        assert_eq!(config.pool.num_workers, 8);
        assert_eq!(config.cache.ttl_ms, 250);
        assert_eq!(
            config.pool.queue_capacity,
            WorkerPoolConfig::DEFAULT_QUEUE_CAPACITY
        );

        std::fs::remove_dir_all(directory).unwrap();
    }
}
