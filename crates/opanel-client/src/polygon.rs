use crate::api::{ContractSource, PriceSource};
use crate::config::{ApiKey, Config};
use crate::error::{PanelError, PanelResult};
use crate::schema::{ContractDescriptor, ContractsPage, ErrorBody, PrevCloseResponse, PriceBar};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, error, trace, warn};
use url::Url;

////////////////////////////////////////////////////////////////////////////////////////////////////
//
// API Documentation: https://polygon.io/docs/options
//
////////////////////////////////////////////////////////////////////////////////////////////////////

const CONTRACTS_PATH: &str = "v3/reference/options/contracts";

/// Polygon.io REST client implementing both sides of the panel.
#[derive(Debug, Clone)]
pub struct Polygon {
    http: Client,
    api_key: Option<ApiKey>,
    base_url: Url,
}

impl Polygon {
    pub fn new(config: &Config) -> Result<Self, reqwest::Error> {
        let http = reqwest::ClientBuilder::new()
            .user_agent(concat!("opanel/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout)
            .build()?;
        Ok(Polygon {
            http,
            api_key: config.api_key.clone(),
            base_url: config.base_url.clone(),
        })
    }

    // every call goes through here first, so a missing key never reaches the network
    fn key(&self) -> PanelResult<&ApiKey> {
        self.api_key.as_ref().ok_or(PanelError::MissingCredential)
    }

    fn contracts_url(&self, ticker: &str, limit: usize) -> PanelResult<Url> {
        let mut url = self
            .base_url
            .join(CONTRACTS_PATH)
            .map_err(|e| PanelError::UpstreamUnavailable(format!("bad endpoint URL: {e}")))?;
        url.query_pairs_mut()
            .append_pair("underlying_ticker", ticker)
            .append_pair("expired", "false")
            .append_pair("limit", &limit.to_string());
        Ok(url)
    }

    fn prev_close_url(&self, contract_identifier: &str) -> PanelResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                PanelError::UpstreamUnavailable(format!(
                    "base URL cannot hold a path: {}",
                    self.base_url
                ))
            })?
            .pop_if_empty()
            .extend(["v2", "aggs", "ticker", contract_identifier, "prev"]);
        url.query_pairs_mut().append_pair("adjusted", "true");
        Ok(url)
    }

    /// Follow-up page from `next_url`; the key travels in a header, so the
    /// cursor must stay on the configured host.
    fn next_page_url(&self, raw: &str) -> PanelResult<Url> {
        let url = Url::parse(raw).map_err(|e| {
            PanelError::UpstreamUnavailable(format!("malformed next_url {raw:?}: {e}"))
        })?;
        if url.origin() != self.base_url.origin() {
            error!("next_url {url} points away from {}", self.base_url);
            return Err(PanelError::UpstreamUnavailable(format!(
                "pagination cursor points to a foreign host: {}",
                url.host_str().unwrap_or_default()
            )));
        }
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> PanelResult<T> {
        let key = self.key()?;
        trace!("GET {}", url.path());
        let response = self
            .http
            .get(url.clone())
            .bearer_auth(key.expose())
            .send()
            .await
            .map_err(|e| {
                error!("request to {} failed: {e}", url.path());
                PanelError::from(e)
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response.json::<T>().await?);
        }

        let body = response.text().await.unwrap_or_default();
        Err(status_error(status, &body))
    }
}

/// Maps a non-2xx response onto the error taxonomy.
pub(crate) fn status_error(status: StatusCode, body: &str) -> PanelError {
    let code = status.as_u16();
    let reason = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(ErrorBody::reason);

    if status.is_client_error() {
        let message = reason.unwrap_or_else(|| format!("HTTP {code}"));
        warn!("upstream rejected request: {code} {message}");
        PanelError::UpstreamRejected { status: code, message }
    } else {
        let message = match reason {
            Some(reason) => format!("HTTP {code}: {reason}"),
            None => format!("HTTP {code}"),
        };
        warn!("upstream failed: {message}");
        PanelError::UpstreamUnavailable(message)
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////

#[async_trait]
impl ContractSource for Polygon {
    async fn resolve(&self, ticker: &str, limit: usize) -> PanelResult<Vec<ContractDescriptor>> {
        self.key()?;
        let time = std::time::Instant::now();

        let mut contracts: Vec<ContractDescriptor> = Vec::with_capacity(limit);
        let mut next = Some(self.contracts_url(ticker, limit)?);
        let mut pages = 0;

        while let Some(url) = next.take() {
            let mut page: ContractsPage = self.get_json(url).await?;
            pages += 1;
            if page.results.is_empty() {
                break;
            }
            let next_url = page.next_url.take();
            let (readable, unreadable) = page.into_contracts();
            for record in unreadable {
                warn!(
                    "[{ticker}] dropping contract {}: {}",
                    record.contract_identifier.as_deref().unwrap_or("<no ticker>"),
                    record.reason
                );
            }
            contracts.extend(readable);
            if contracts.len() >= limit {
                break;
            }
            next = match next_url {
                Some(raw) => Some(self.next_page_url(&raw)?),
                None => None,
            };
        }
        contracts.truncate(limit);

        debug!(
            "[{ticker}] resolved {} contracts over {pages} page(s). Elapsed time: {} ms",
            contracts.len(),
            time.elapsed().as_millis()
        );
        Ok(contracts)
    }
}

#[async_trait]
impl PriceSource for Polygon {
    async fn previous_close(&self, contract_identifier: &str) -> PanelResult<Option<PriceBar>> {
        self.key()?;
        let url = self.prev_close_url(contract_identifier)?;
        let response: PrevCloseResponse = self.get_json(url).await?;
        let bar = response.into_bar();
        if bar.is_none() {
            trace!("[{contract_identifier}] no previous session");
        }
        Ok(bar)
    }
}
