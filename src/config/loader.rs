//! Configuration loading with hierarchy merging.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::error::ConfigError;
use super::schema::SudoConfig;

/// System-wide configuration path.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/sudo-proxy/config.toml";

/// User configuration directory name.
pub const USER_CONFIG_DIR: &str = "sudo-proxy";

/// User configuration filename.
pub const USER_CONFIG_FILE: &str = "config.toml";

/// Configuration loader with support for hierarchy merging.
pub struct ConfigLoader {
    system_path: PathBuf,
    user_path: PathBuf,
}

impl ConfigLoader {
    /// Create a new loader with the default paths.
    #[must_use]
    pub fn new() -> Self {
        let user_config_dir = dirs::config_dir()
            .map(|p| p.join(USER_CONFIG_DIR))
            .unwrap_or_else(|| PathBuf::from(".config").join(USER_CONFIG_DIR));

        Self {
            system_path: PathBuf::from(SYSTEM_CONFIG_PATH),
            user_path: user_config_dir.join(USER_CONFIG_FILE),
        }
    }

    /// Create a loader with custom paths (for testing).
    #[must_use]
    pub fn with_paths(system_path: PathBuf, user_path: PathBuf) -> Self {
        Self {
            system_path,
            user_path,
        }
    }

    /// Load and merge configuration from all sources.
    ///
    /// Merge order: built-in defaults, system config, user config, then
    /// the optional `extra` file from the host application. Missing files
    /// are skipped; invalid TOML fails fast with the offending path.
    pub fn load(&self, extra: Option<&Path>) -> Result<SudoConfig, ConfigError> {
        let mut config = SudoConfig::default();

        if let Some(system) = self.load_file(&self.system_path)? {
            config.merge(system);
            debug!("Loaded system config from {:?}", self.system_path);
        }

        if let Some(user) = self.load_file(&self.user_path)? {
            config.merge(user);
            debug!("Loaded user config from {:?}", self.user_path);
        }

        if let Some(path) = extra
            && let Some(extra_config) = self.load_file(path)?
        {
            config.merge(extra_config);
            debug!("Loaded extra config from {:?}", path);
        }

        Ok(config)
    }

    fn load_file(&self, path: &Path) -> Result<Option<SudoConfig>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }

        let contents = fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;

        let config = toml::from_str(&contents).map_err(|source| ConfigError::ParseError {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(Some(config))
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    fn write_config(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_missing_files_yield_defaults() {
        let dir = tempdir().unwrap();
        let loader = ConfigLoader::with_paths(
            dir.path().join("nope-system.toml"),
            dir.path().join("nope-user.toml"),
        );

        let config = loader.load(None).unwrap();
        assert_eq!(config.timeouts.ready_secs, 120);
    }

    #[test]
    fn test_user_overrides_system() {
        let dir = tempdir().unwrap();
        let system = write_config(
            dir.path(),
            "system.toml",
            "[timeouts]\ncall_secs = 30\nready_secs = 10\n",
        );
        let user = write_config(dir.path(), "user.toml", "[timeouts]\ncall_secs = 90\n");

        let loader = ConfigLoader::with_paths(system, user);
        let config = loader.load(None).unwrap();

        assert_eq!(config.timeouts.call_secs, 90);
        assert_eq!(config.timeouts.ready_secs, 10);
    }

    #[test]
    fn test_extra_file_has_highest_priority() {
        let dir = tempdir().unwrap();
        let user = write_config(dir.path(), "user.toml", "[timeouts]\nclose_secs = 2\n");
        let extra = write_config(dir.path(), "extra.toml", "[timeouts]\nclose_secs = 9\n");

        let loader = ConfigLoader::with_paths(dir.path().join("no-system.toml"), user);
        let config = loader.load(Some(&extra)).unwrap();

        assert_eq!(config.timeouts.close_secs, 9);
    }

    #[test]
    fn test_invalid_toml_fails_with_path() {
        let dir = tempdir().unwrap();
        let bad = write_config(dir.path(), "bad.toml", "timeouts = not valid toml {");

        let loader = ConfigLoader::with_paths(bad.clone(), dir.path().join("no-user.toml"));
        let err = loader.load(None).unwrap_err();

        match err {
            ConfigError::ParseError { path, .. } => assert_eq!(path, bad),
            other => unreachable!("Expected ParseError, got {other:?}"),
        }
    }
}
