use crate::error::PanelResult;
use crate::schema::{ContractDescriptor, PriceBar};
use async_trait::async_trait;

/// Reference-data side: which contracts exist for an underlying.
#[async_trait]
pub trait ContractSource: Send + Sync {
    /// Up to `limit` active contracts for `ticker`, in source order.
    /// An empty vector means the underlying has no listed options.
    async fn resolve(&self, ticker: &str, limit: usize) -> PanelResult<Vec<ContractDescriptor>>;
}

/// Price side: the last completed session for one contract.
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// `Ok(None)` when the contract has not traded a full session yet.
    async fn previous_close(&self, contract_identifier: &str) -> PanelResult<Option<PriceBar>>;
}
