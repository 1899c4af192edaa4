use crate::api::{ContractSource, PriceSource};
use crate::error::{PanelError, PanelResult};
use crate::schema::DisplayRow;
use serde::Serialize;
use std::ops::RangeInclusive;
use tracing::{debug, info, warn};

pub const LIMIT_RANGE: RangeInclusive<usize> = 1..=50;
pub const DEFAULT_LIMIT: usize = 5;
pub const DEFAULT_TICKER: &str = "AAPL";
const MAX_TICKER_LEN: usize = 32;

///////////////////////////////////////////////////////////////////////////////////////////////////
//
// Request
//
///////////////////////////////////////////////////////////////////////////////////////////////////

/// A validated (ticker, limit) pair. Holding one means no further checks are needed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelRequest {
    ticker: String,
    limit: usize,
}

impl PanelRequest {
    pub fn new(ticker: &str, limit: usize) -> PanelResult<Self> {
        let ticker = ticker.trim().to_uppercase();
        if ticker.is_empty() {
            return Err(PanelError::InvalidInput("ticker must not be empty".into()));
        }
        if ticker.len() > MAX_TICKER_LEN
            || !ticker
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | ':'))
        {
            return Err(PanelError::InvalidInput(format!(
                "{ticker:?} is not a ticker symbol"
            )));
        }
        if !LIMIT_RANGE.contains(&limit) {
            return Err(PanelError::InvalidInput(format!(
                "contract count must be between {} and {}, got {limit}",
                LIMIT_RANGE.start(),
                LIMIT_RANGE.end()
            )));
        }
        Ok(PanelRequest { ticker, limit })
    }

    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    pub fn limit(&self) -> usize {
        self.limit
    }
}

///////////////////////////////////////////////////////////////////////////////////////////////////
//
// Result
//
///////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PanelStatus {
    Rows,
    NoContracts,
    /// Contracts were found but every price lookup failed.
    PricesUnavailable,
}

/// A contract whose price lookup failed and was left out of the rows.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct SkippedContract {
    pub contract_identifier: String,
    pub reason: String,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Panel {
    pub ticker: String,
    pub status: PanelStatus,
    pub rows: Vec<DisplayRow>,
    pub skipped: Vec<SkippedContract>,
}

impl Panel {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

///////////////////////////////////////////////////////////////////////////////////////////////////
//
// Pipeline
//
///////////////////////////////////////////////////////////////////////////////////////////////////

/// Resolve contracts, then look up each one's previous close, in order.
///
/// A failed price lookup drops that contract into [`Panel::skipped`] and the
/// run continues; the one exception is [`PanelError::MissingCredential`], which
/// no other contract could get past either. A resolver failure aborts the run.
pub async fn fetch_panel(
    request: &PanelRequest,
    contracts: &dyn ContractSource,
    prices: &dyn PriceSource,
) -> PanelResult<Panel> {
    let ticker = request.ticker();
    let time = std::time::Instant::now();

    let mut descriptors = contracts.resolve(ticker, request.limit()).await?;
    descriptors.truncate(request.limit());

    if descriptors.is_empty() {
        info!("[{ticker}] no active contracts found");
        return Ok(Panel {
            ticker: ticker.to_string(),
            status: PanelStatus::NoContracts,
            rows: vec![],
            skipped: vec![],
        });
    }

    let mut rows = Vec::with_capacity(descriptors.len());
    let mut skipped = Vec::new();
    for contract in descriptors {
        match prices.previous_close(&contract.contract_identifier).await {
            Ok(price) => rows.push(DisplayRow::merge(contract, price)),
            Err(PanelError::MissingCredential) => return Err(PanelError::MissingCredential),
            Err(e) => {
                warn!("[{ticker}] skipping {}: {e}", contract.contract_identifier);
                skipped.push(SkippedContract {
                    contract_identifier: contract.contract_identifier,
                    reason: e.to_string(),
                });
            }
        }
    }

    debug!(
        "[{ticker}] panel built: {} rows, {} skipped. Elapsed time: {} ms",
        rows.len(),
        skipped.len(),
        time.elapsed().as_millis()
    );

    let status = if rows.is_empty() {
        warn!("[{ticker}] every price lookup failed");
        PanelStatus::PricesUnavailable
    } else {
        PanelStatus::Rows
    };

    Ok(Panel {
        ticker: ticker.to_string(),
        status,
        rows,
        skipped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ContractDescriptor, ContractType, PriceBar};
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn contract(id: &str, strike: f64, kind: ContractType) -> ContractDescriptor {
        ContractDescriptor {
            contract_identifier: id.to_string(),
            strike_price: strike,
            contract_type: kind,
            expiration_date: NaiveDate::from_ymd_opt(2024, 8, 16).unwrap(),
        }
    }

    fn bar(close: f64) -> PriceBar {
        PriceBar {
            open: close - 0.5,
            high: close + 1.0,
            low: close - 1.0,
            close,
            session_date: NaiveDate::from_ymd_opt(2024, 8, 8).unwrap(),
        }
    }

    #[derive(Default)]
    struct FakeContracts {
        contracts: Vec<ContractDescriptor>,
        fail: Option<PanelError>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ContractSource for FakeContracts {
        async fn resolve(
            &self,
            _ticker: &str,
            _limit: usize,
        ) -> PanelResult<Vec<ContractDescriptor>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.fail {
                Some(e) => Err(e.clone()),
                None => Ok(self.contracts.clone()),
            }
        }
    }

    #[derive(Default)]
    struct FakePrices {
        bars: HashMap<String, PanelResult<Option<PriceBar>>>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl PriceSource for FakePrices {
        async fn previous_close(&self, id: &str) -> PanelResult<Option<PriceBar>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.bars
                .get(id)
                .cloned()
                .unwrap_or_else(|| Err(PanelError::UpstreamUnavailable("unknown".into())))
        }
    }

    #[test]
    fn request_validation() {
        let req = PanelRequest::new("  aapl ", 3).unwrap();
        assert_eq!(req.ticker(), "AAPL");
        assert_eq!(req.limit(), 3);
        assert!(PanelRequest::new("BRK.B", 50).is_ok());
        assert_eq!(PanelRequest::new("i:spx", 5).unwrap().ticker(), "I:SPX");

        for (ticker, limit) in [
            ("", 5),
            ("   ", 5),
            ("AA PL", 5),
            ("AAPL/../X", 5),
            ("AAPL", 0),
            ("AAPL", 51),
        ] {
            assert!(
                matches!(
                    PanelRequest::new(ticker, limit),
                    Err(PanelError::InvalidInput(_))
                ),
                "{ticker:?}/{limit} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn end_to_end_keeps_order_and_fields() {
        let contracts = FakeContracts {
            contracts: vec![
                contract("O:AAPL240816C00150000", 150.0, ContractType::Call),
                contract("O:AAPL240816P00155000", 155.0, ContractType::Put),
                contract("O:AAPL240816C00160000", 160.0, ContractType::Call),
            ],
            ..Default::default()
        };
        let prices = FakePrices {
            bars: HashMap::from([
                ("O:AAPL240816C00150000".to_string(), Ok(Some(bar(10.0)))),
                ("O:AAPL240816P00155000".to_string(), Ok(Some(bar(4.0)))),
                ("O:AAPL240816C00160000".to_string(), Ok(Some(bar(2.5)))),
            ]),
            ..Default::default()
        };

        let req = PanelRequest::new("AAPL", 3).unwrap();
        let panel = fetch_panel(&req, &contracts, &prices).await.unwrap();

        assert_eq!(panel.status, PanelStatus::Rows);
        assert_eq!(panel.rows.len(), 3);
        assert!(panel.skipped.is_empty());
        for (row, source) in panel.rows.iter().zip(&contracts.contracts) {
            assert_eq!(&row.contract, source);
        }
        let closes: Vec<f64> = panel
            .rows
            .iter()
            .map(|row| row.price.as_ref().unwrap().close)
            .collect();
        assert_eq!(closes, vec![10.0, 4.0, 2.5]);
        assert_eq!(panel.rows[1].price, Some(bar(4.0)));
        assert_eq!(contracts.calls.load(Ordering::SeqCst), 1);
        assert_eq!(prices.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn failed_price_lookup_is_skipped() {
        let contracts = FakeContracts {
            contracts: vec![
                contract("C1", 150.0, ContractType::Call),
                contract("C2", 155.0, ContractType::Call),
                contract("C3", 160.0, ContractType::Put),
            ],
            ..Default::default()
        };
        let prices = FakePrices {
            bars: HashMap::from([
                ("C1".to_string(), Ok(Some(bar(1.0)))),
                (
                    "C2".to_string(),
                    Err(PanelError::UpstreamUnavailable("timed out".into())),
                ),
                ("C3".to_string(), Ok(Some(bar(3.0)))),
            ]),
            ..Default::default()
        };

        let req = PanelRequest::new("AAPL", 3).unwrap();
        let panel = fetch_panel(&req, &contracts, &prices).await.unwrap();

        let ids: Vec<&str> = panel
            .rows
            .iter()
            .map(|row| row.contract.contract_identifier.as_str())
            .collect();
        assert_eq!(ids, vec!["C1", "C3"]);
        assert_eq!(panel.status, PanelStatus::Rows);
        assert_eq!(panel.skipped.len(), 1);
        assert_eq!(panel.skipped[0].contract_identifier, "C2");
        assert!(panel.skipped[0].reason.contains("timed out"));
    }

    #[tokio::test]
    async fn all_price_lookups_failing_is_its_own_status() {
        let contracts = FakeContracts {
            contracts: vec![
                contract("C1", 150.0, ContractType::Call),
                contract("C2", 155.0, ContractType::Put),
            ],
            ..Default::default()
        };
        let prices = FakePrices::default();

        let req = PanelRequest::new("AAPL", 2).unwrap();
        let panel = fetch_panel(&req, &contracts, &prices).await.unwrap();
        assert_eq!(panel.status, PanelStatus::PricesUnavailable);
        assert!(panel.is_empty());
        assert_eq!(panel.skipped.len(), 2);
        assert_eq!(prices.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn contract_without_session_keeps_blank_prices() {
        let contracts = FakeContracts {
            contracts: vec![contract("NEW", 100.0, ContractType::Call)],
            ..Default::default()
        };
        let prices = FakePrices {
            bars: HashMap::from([("NEW".to_string(), Ok(None))]),
            ..Default::default()
        };

        let req = PanelRequest::new("AAPL", 1).unwrap();
        let panel = fetch_panel(&req, &contracts, &prices).await.unwrap();
        assert_eq!(panel.rows.len(), 1);
        assert!(panel.rows[0].price.is_none());
        assert!(panel.skipped.is_empty());
    }

    #[tokio::test]
    async fn no_contracts_is_a_status_not_an_error() {
        let contracts = FakeContracts::default();
        let prices = FakePrices::default();

        let req = PanelRequest::new("ZZZZ", 5).unwrap();
        let panel = fetch_panel(&req, &contracts, &prices).await.unwrap();
        assert_eq!(panel.status, PanelStatus::NoContracts);
        assert!(panel.is_empty());
        assert_eq!(prices.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn rows_never_exceed_limit() {
        let contracts = FakeContracts {
            contracts: (0..10)
                .map(|i| contract(&format!("C{i}"), 100.0 + i as f64, ContractType::Call))
                .collect(),
            ..Default::default()
        };
        let prices = FakePrices {
            bars: (0..10)
                .map(|i| (format!("C{i}"), Ok(Some(bar(1.0)))))
                .collect(),
            ..Default::default()
        };

        for limit in [1, 4, 10, 50] {
            let req = PanelRequest::new("AAPL", limit).unwrap();
            let panel = fetch_panel(&req, &contracts, &prices).await.unwrap();
            assert!(panel.rows.len() <= limit);
            assert!(panel.rows.len() <= contracts.contracts.len());
        }
    }

    #[tokio::test]
    async fn resolver_errors_propagate() {
        let contracts = FakeContracts {
            fail: Some(PanelError::UpstreamRejected {
                status: 401,
                message: "Unknown API Key".into(),
            }),
            ..Default::default()
        };
        let prices = FakePrices::default();

        let req = PanelRequest::new("AAPL", 5).unwrap();
        let err = fetch_panel(&req, &contracts, &prices).await.unwrap_err();
        assert!(matches!(err, PanelError::UpstreamRejected { status: 401, .. }));
        assert_eq!(prices.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_credential_on_prices_aborts() {
        let contracts = FakeContracts {
            contracts: vec![
                contract("C1", 150.0, ContractType::Call),
                contract("C2", 155.0, ContractType::Call),
            ],
            ..Default::default()
        };
        let prices = FakePrices {
            bars: HashMap::from([
                ("C1".to_string(), Err(PanelError::MissingCredential)),
                ("C2".to_string(), Ok(Some(bar(1.0)))),
            ]),
            ..Default::default()
        };

        let req = PanelRequest::new("AAPL", 2).unwrap();
        let err = fetch_panel(&req, &contracts, &prices).await.unwrap_err();
        assert_eq!(err, PanelError::MissingCredential);
        assert_eq!(prices.calls.load(Ordering::SeqCst), 1);
    }
}
