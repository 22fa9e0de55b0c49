use gxcrawler_scanner::Credentials;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

pub const USER_KEY: &str = "GX_USER";
pub const PASSWORD_KEY: &str = "GX_PASSWORD";
pub const URL_KEY: &str = "GX_URL";
pub const KB_NAME_KEY: &str = "GX_KBNAME";

/// File consulted by [`ConfigSource::Auto`] when the environment has no user.
pub const DEFAULT_CONFIG_FILE: &str = ".env";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("configuration value {key} is not set")]
    Missing { key: &'static str },

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed line {line} in configuration file: expected KEY=VALUE")]
    Malformed { line: usize },
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Where connection settings are read from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConfigSource {
    /// Environment first, then `./.env` when `GX_USER` is absent.
    #[default]
    Auto,
    Environment,
    File(PathBuf),
}

/// Server connection settings.
#[derive(Clone, PartialEq, Eq)]
pub struct Config {
    pub user: String,
    pub password: String,
    pub url: String,
    pub kb_name: String,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("url", &self.url)
            .field("kb_name", &self.kb_name)
            .finish()
    }
}

impl Config {
    pub fn load(source: &ConfigSource) -> Result<Self> {
        match source {
            ConfigSource::Environment => Self::from_env(),
            ConfigSource::File(path) => Self::from_file(path),
            ConfigSource::Auto => {
                if non_empty(std::env::var(USER_KEY).ok()).is_some() {
                    debug!("Reading configuration from the environment");
                    Self::from_env()
                } else {
                    debug!("{} not set, reading {}", USER_KEY, DEFAULT_CONFIG_FILE);
                    Self::from_file(Path::new(DEFAULT_CONFIG_FILE))
                }
            }
        }
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_pairs(parse_pairs(&content)?)
    }

    /// Later pairs override earlier ones; unknown keys are ignored.
    pub fn from_pairs<I>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut user = None;
        let mut password = None;
        let mut url = None;
        let mut kb_name = None;

        for (key, value) in pairs {
            match key.as_str() {
                USER_KEY => user = Some(value),
                PASSWORD_KEY => password = Some(value),
                URL_KEY => url = Some(value),
                KB_NAME_KEY => kb_name = Some(value),
                _ => {}
            }
        }

        Self::from_lookup(|key| match key {
            USER_KEY => user.clone(),
            PASSWORD_KEY => password.clone(),
            URL_KEY => url.clone(),
            KB_NAME_KEY => kb_name.clone(),
            _ => None,
        })
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&'static str) -> Option<String>,
    {
        let require = |key: &'static str| non_empty(lookup(key)).ok_or(ConfigError::Missing { key });

        Ok(Self {
            user: require(USER_KEY)?,
            password: require(PASSWORD_KEY)?,
            url: require(URL_KEY)?,
            kb_name: require(KB_NAME_KEY)?,
        })
    }

    pub fn credentials(&self) -> Credentials {
        Credentials {
            user: self.user.clone(),
            password: self.password.clone(),
            url: self.url.clone(),
            kb_name: self.kb_name.clone(),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Split `KEY=VALUE` lines at the first `=`.
pub fn parse_pairs(content: &str) -> Result<Vec<(String, String)>> {
    let mut pairs = Vec::new();
    for (index, raw) in content.lines().enumerate() {
        let line = raw.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() || line.trim_start().starts_with('#') {
            continue;
        }
        let (key, value) = line
            .split_once('=')
            .ok_or(ConfigError::Malformed { line: index + 1 })?;
        pairs.push((key.trim().to_string(), value.to_string()));
    }
    Ok(pairs)
}
