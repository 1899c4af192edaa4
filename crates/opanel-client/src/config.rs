use crate::error::ConfigError;
use serde::Deserialize;
use std::fmt;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, trace, warn};
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://api.polygon.io/";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Environment variable holding the Polygon API key.
pub const API_KEY_VAR: &str = "POLYGON_API_KEY";
/// Key looked up in the TOML secrets file when the environment has none.
pub const SECRETS_KEY: &str = "polygon_api_key";

///////////////////////////////////////////////////////////////////////////////////////////////////
//
// Credential
//
///////////////////////////////////////////////////////////////////////////////////////////////////

/// Polygon API key. Never printed in full.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    /// Returns `None` for a blank key, so an empty variable counts as absent.
    pub fn new(key: impl Into<String>) -> Option<Self> {
        let key = key.into().trim().to_string();
        if key.is_empty() {
            None
        } else {
            Some(ApiKey(key))
        }
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(****)")
    }
}

///////////////////////////////////////////////////////////////////////////////////////////////////
//
// Config
//
///////////////////////////////////////////////////////////////////////////////////////////////////

/// Everything the Polygon client needs, resolved once at start-up.
#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: Option<ApiKey>,
    pub base_url: Url,
    pub timeout: Duration,
}

#[derive(Deserialize, Debug, Default)]
struct Secrets {
    polygon_api_key: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            api_key: None,
            base_url: Url::parse(DEFAULT_BASE_URL).expect("default base URL is valid"),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl Config {
    pub fn new(api_key: Option<ApiKey>) -> Self {
        Config {
            api_key,
            ..Default::default()
        }
    }

    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = normalise(base_url);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Reads the process environment (after loading `.env`) and the secrets file.
    pub fn load(secrets_path: &Path) -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::resolve(|name| dotenv::var(name).ok(), secrets_path)
    }

    /// Builds a config from an arbitrary variable lookup.
    ///
    /// The API key comes from `POLYGON_API_KEY` first, then from `polygon_api_key`
    /// in the secrets file. A missing secrets file is fine; a malformed one is not.
    pub fn resolve<F>(env: F, secrets_path: &Path) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = match env(API_KEY_VAR).and_then(ApiKey::new) {
            Some(key) => {
                trace!("API key found in {API_KEY_VAR}");
                Some(key)
            }
            None => read_secrets(secrets_path)?
                .polygon_api_key
                .and_then(ApiKey::new),
        };
        if api_key.is_none() {
            warn!(
                "no API key in {API_KEY_VAR} or {}; every request will fail",
                secrets_path.display()
            );
        }

        let mut config = Config::new(api_key);

        if let Some(raw) = env("POLYGON_BASE_URL") {
            let url = Url::parse(&raw).map_err(|e| ConfigError::BaseUrl(raw.clone(), e))?;
            config = config.with_base_url(url);
        }

        if let Some(raw) = env("POLYGON_TIMEOUT_SECS") {
            let secs = raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .ok_or_else(|| ConfigError::Timeout(raw.clone()))?;
            config = config.with_timeout(Duration::from_secs(secs));
        }

        debug!(
            "config resolved: base_url = {}, timeout = {:?}, api key present = {}",
            config.base_url,
            config.timeout,
            config.api_key.is_some()
        );
        Ok(config)
    }
}

fn read_secrets(path: &Path) -> Result<Secrets, ConfigError> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            trace!("no secrets file at {}", path.display());
            return Ok(Secrets::default());
        }
        Err(source) => {
            return Err(ConfigError::SecretsIo {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    toml::from_str(&text).map_err(|source| ConfigError::SecretsParse {
        path: path.to_path_buf(),
        source,
    })
}

// `Url::join` drops the last segment unless the path ends in '/'
fn normalise(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}
