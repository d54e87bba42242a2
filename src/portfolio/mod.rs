mod capture;
mod history;
mod jsonl_store;
mod models;
mod period;
mod reconstruction;
mod snapshot;
mod store;

pub use capture::DailyCapture;
pub use history::{DataSource, HistoryAssembler, HistoryPoint, HistorySeries};
pub use jsonl_store::JsonlSnapshotStore;
pub use models::{AccountBreakdown, PortfolioSnapshot, PriceSource, SecurityValuation, SnapshotType};
pub use period::ChartPeriod;
pub use reconstruction::{window_start, ReconstructionReport, Reconstructor};
pub use snapshot::{PriceLookup, SecurityContext, SnapshotBuilder, TablePrices};
pub use store::{MemorySnapshotStore, SnapshotStore};
