use std::path::PathBuf;
use thiserror::Error;

/// Everything that can stop a panel from being built.
///
/// An empty contract list is not an error; see [`PanelStatus::NoContracts`].
///
/// [`PanelStatus::NoContracts`]: crate::panel::PanelStatus::NoContracts
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PanelError {
    #[error("API key is missing; set POLYGON_API_KEY or add polygon_api_key to the secrets file")]
    MissingCredential,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("upstream rejected the request (HTTP {status}): {message}")]
    UpstreamRejected { status: u16, message: String },
}

impl PanelError {
    /// Short machine-readable name, used by the JSON endpoint.
    pub fn kind(&self) -> &'static str {
        match self {
            PanelError::MissingCredential => "missing_credential",
            PanelError::InvalidInput(_) => "invalid_input",
            PanelError::UpstreamUnavailable(_) => "upstream_unavailable",
            PanelError::UpstreamRejected { .. } => "upstream_rejected",
        }
    }
}

impl From<reqwest::Error> for PanelError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            return PanelError::UpstreamUnavailable(format!("malformed response body: {e}"));
        }
        PanelError::UpstreamUnavailable(e.to_string())
    }
}

pub type PanelResult<T> = std::result::Result<T, PanelError>;

/// Failures while assembling [`Config`](crate::config::Config) at start-up.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read secrets file {}: {source}", .path.display())]
    SecretsIo {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse secrets file {}: {source}", .path.display())]
    SecretsParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid base URL {0:?}: {1}")]
    BaseUrl(String, url::ParseError),

    #[error("invalid POLYGON_TIMEOUT_SECS {0:?}")]
    Timeout(String),
}
