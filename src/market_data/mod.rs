pub mod calendar;
mod jsonl_store;
mod models;
mod provider;
#[cfg(feature = "providers")]
pub mod providers;
mod retry;
mod service;
mod store;

pub use jsonl_store::JsonlPriceCacheStore;
pub use models::{normalize_symbol, PricePoint, PriceTable, SymbolMatch};
pub use provider::{NoopPriceFeed, PriceFeedProvider};
pub use retry::RetryPolicy;
pub use service::{PriceFetchReport, PriceService};
pub use store::{MemoryPriceCacheStore, PriceCacheStore};
