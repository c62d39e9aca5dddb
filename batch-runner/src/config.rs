// Copyright (c) The stbt-batch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration support for the batch harness.
//!
//! The harness does not own global configuration; it consumes a read-only
//! key/value view of it. [`BatchConfig`] is that view: dotted keys
//! (`batch.pre_run`, `global.source`, ...) looked up in the operator's
//! `stbt.conf`, with `STBT_*` environment variables layered on top. The
//! config is passed explicitly into the components that need it
//! ([`HookRunner`](crate::hooks::HookRunner),
//! [hardware diagnostics](crate::classify)) rather than accessed ambiently.

use crate::errors::{ConfigKeyError, ConfigReadError};
use camino::Utf8Path;
use config::{Config, Environment, File, FileFormat};

/// A read-only view of the operator's configuration.
#[derive(Clone, Debug)]
pub struct BatchConfig {
    inner: Config,
}

impl BatchConfig {
    /// The default location of the config file, relative to the current
    /// directory.
    pub const CONFIG_PATH: &'static str = "stbt.conf";

    /// Environment configuration uses this prefix plus an underscore;
    /// nesting within a key uses a double underscore
    /// (`STBT_BATCH__PRE_RUN` → `batch.pre_run`).
    pub const ENVIRONMENT_PREFIX: &'static str = "STBT";

    /// Reads the configuration from the given file, or from
    /// [`CONFIG_PATH`](Self::CONFIG_PATH) if not specified.
    ///
    /// An explicitly specified file must exist; the default location is
    /// optional. Environment variables override file values.
    pub fn from_sources(config_file: Option<&Utf8Path>) -> Result<Self, ConfigReadError> {
        let (file, file_for_error) = match config_file {
            Some(path) => (
                File::new(path.as_str(), FileFormat::Toml),
                path.to_owned(),
            ),
            None => (
                File::new(Self::CONFIG_PATH, FileFormat::Toml).required(false),
                Self::CONFIG_PATH.into(),
            ),
        };

        let inner = Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix(Self::ENVIRONMENT_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()
            .map_err(|err| ConfigReadError::new(file_for_error, err))?;

        Ok(Self { inner })
    }

    /// Looks up a dotted key as a string.
    ///
    /// Absence of the key is a normal `None`, distinguishable from a
    /// malformed value (a table where a string was expected), which is an
    /// error.
    pub fn get_string(&self, key: &str) -> Result<Option<String>, ConfigKeyError> {
        match self.inner.get_string(key) {
            Ok(value) => Ok(Some(value)),
            Err(config::ConfigError::NotFound(_)) => Ok(None),
            Err(err) => Err(ConfigKeyError::new(key, err)),
        }
    }

    /// Like [`get_string`](Self::get_string), but a malformed value is
    /// logged and treated as absent. For callers whose contract is "any
    /// problem means the key is not usable".
    pub fn get_string_lenient(&self, key: &str) -> Option<String> {
        match self.get_string(key) {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!("ignoring malformed configuration key: {err}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino_tempfile::Utf8TempDir;
    use indoc::indoc;

    fn write_config(dir: &Utf8TempDir, contents: &str) -> camino::Utf8PathBuf {
        let path = dir.path().join("stbt.conf");
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn lookup_present_and_absent_keys() {
        let dir = Utf8TempDir::new().unwrap();
        let path = write_config(
            &dir,
            indoc! {r#"
                [global]
                source = "decklinksrc"
                source_pipeline = "decklinksrc mode=1080i50"

                [batch]
                pre_run = "/usr/local/bin/power-cycle"
            "#},
        );

        let config = BatchConfig::from_sources(Some(path.as_path())).unwrap();
        assert_eq!(
            config.get_string("global.source").unwrap().as_deref(),
            Some("decklinksrc")
        );
        assert_eq!(
            config.get_string("batch.pre_run").unwrap().as_deref(),
            Some("/usr/local/bin/power-cycle")
        );
        // Absence is None, not an error.
        assert_eq!(config.get_string("batch.post_run").unwrap(), None);
        assert_eq!(config.get_string("no.such.section").unwrap(), None);
    }

    #[test]
    fn malformed_value_is_an_error_not_absence() {
        let dir = Utf8TempDir::new().unwrap();
        let path = write_config(
            &dir,
            indoc! {r#"
                [batch.pre_run]
                nested = "table"
            "#},
        );

        let config = BatchConfig::from_sources(Some(path.as_path())).unwrap();
        assert!(config.get_string("batch.pre_run").is_err());
        assert_eq!(config.get_string_lenient("batch.pre_run"), None);
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = Utf8TempDir::new().unwrap();
        let path = dir.path().join("nonexistent.conf");
        assert!(BatchConfig::from_sources(Some(path.as_path())).is_err());
    }

    #[test]
    fn missing_default_file_is_fine() {
        // No stbt.conf in the current directory is the common case on
        // developer machines; everything just reads as absent.
        let config = BatchConfig::from_sources(None).unwrap();
        let _ = config.get_string("batch.pre_run");
    }
}
