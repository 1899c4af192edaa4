pub mod api;
pub mod config;
pub mod error;
pub mod panel;
pub mod polygon;
pub mod schema;

pub mod prelude {
    pub use crate::api::{ContractSource, PriceSource};
    pub use crate::config::{ApiKey, Config};
    pub use crate::error::{ConfigError, PanelError};
    pub use crate::panel::{fetch_panel, Panel, PanelRequest, PanelStatus, SkippedContract};
    pub use crate::polygon::Polygon;
    pub use crate::schema::{ContractDescriptor, ContractType, DisplayRow, PriceBar};
}
