use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

///////////////////////////////////////////////////////////////////////////////////////////////////
//
// Domain
//
///////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ContractType {
    Call,
    Put,
}

impl fmt::Display for ContractType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContractType::Call => f.write_str("call"),
            ContractType::Put => f.write_str("put"),
        }
    }
}

/// Reference data for a single option contract.
/// ```json
/// {
///     "ticker": "O:AAPL240816C00180000",
///     "strike_price": 180,
///     "contract_type": "call",
///     "expiration_date": "2024-08-16"
/// }
/// ```
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct ContractDescriptor {
    #[serde(rename = "ticker")]
    pub contract_identifier: String,
    pub strike_price: f64,
    pub contract_type: ContractType,
    pub expiration_date: NaiveDate,
}

/// Previous-session OHLC for one contract.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct PriceBar {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub session_date: NaiveDate,
}

/// A contract joined with its price bar; `price` is `None` when the contract
/// has no completed session yet.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct DisplayRow {
    #[serde(flatten)]
    pub contract: ContractDescriptor,
    pub price: Option<PriceBar>,
}

impl DisplayRow {
    pub fn merge(contract: ContractDescriptor, price: Option<PriceBar>) -> Self {
        DisplayRow { contract, price }
    }
}

///////////////////////////////////////////////////////////////////////////////////////////////////
//
// Wire
//
///////////////////////////////////////////////////////////////////////////////////////////////////

/// `GET /v3/reference/options/contracts`
///
/// `results` stays raw: the endpoint also lists `"other"` contract types and
/// records without a strike, and those must not sink the rest of the page.
#[derive(Deserialize, Debug)]
pub struct ContractsPage {
    #[serde(default)]
    pub results: Vec<serde_json::Value>,
    pub next_url: Option<String>,
}

/// A contract record that could not be read as a call or put.
#[derive(Debug)]
pub struct UnreadableContract {
    pub contract_identifier: Option<String>,
    pub reason: serde_json::Error,
}

impl ContractsPage {
    /// Decodes each record on its own, in page order.
    pub fn into_contracts(self) -> (Vec<ContractDescriptor>, Vec<UnreadableContract>) {
        let mut contracts = Vec::with_capacity(self.results.len());
        let mut unreadable = Vec::new();
        for record in self.results {
            let contract_identifier = record
                .get("ticker")
                .and_then(serde_json::Value::as_str)
                .map(String::from);
            match serde_json::from_value::<ContractDescriptor>(record) {
                Ok(contract) => contracts.push(contract),
                Err(reason) => unreadable.push(UnreadableContract {
                    contract_identifier,
                    reason,
                }),
            }
        }
        (contracts, unreadable)
    }
}

/// `GET /v2/aggs/ticker/{id}/prev`
#[derive(Deserialize, Debug)]
pub struct PrevCloseResponse {
    #[serde(default)]
    pub results: Option<Vec<AggBar>>,
}

#[derive(Deserialize, Debug)]
pub struct AggBar {
    #[serde(rename = "o")]
    pub open: f64,
    #[serde(rename = "h")]
    pub high: f64,
    #[serde(rename = "l")]
    pub low: f64,
    #[serde(rename = "c")]
    pub close: f64,
    #[serde(rename = "t", deserialize_with = "de_millis")]
    pub session_date: NaiveDate,
}

impl From<AggBar> for PriceBar {
    fn from(bar: AggBar) -> Self {
        PriceBar {
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            session_date: bar.session_date,
        }
    }
}

impl PrevCloseResponse {
    pub fn into_bar(self) -> Option<PriceBar> {
        self.results
            .and_then(|bars| bars.into_iter().next())
            .map(PriceBar::from)
    }
}

/// Error body; Polygon fills either `message` or `error`.
#[derive(Deserialize, Debug, Default)]
pub struct ErrorBody {
    pub message: Option<String>,
    pub error: Option<String>,
}

impl ErrorBody {
    pub fn reason(self) -> Option<String> {
        self.message.or(self.error).filter(|m| !m.trim().is_empty())
    }
}

pub fn de_millis<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let millis: i64 = Deserialize::deserialize(deserializer)?;
    DateTime::from_timestamp_millis(millis)
        .map(|dt| dt.date_naive())
        .ok_or_else(|| serde::de::Error::custom(format!("timestamp out of range: {millis}")))
}
