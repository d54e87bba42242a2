//! Provider security identifiers → canonical price-feed symbols.

mod identifier;
mod json_store;
mod models;
#[cfg(feature = "providers")]
pub mod openfigi;
mod resolver;
pub mod similarity;
mod store;

pub use identifier::{IdentifierMappingProvider, NoopIdentifierMapper};
pub use json_store::JsonMappingCacheStore;
pub use models::{IdentifierType, Resolution, ResolutionMethod, SymbolMapping, UnresolvedSecurity};
pub use resolver::SymbolResolver;
pub use store::{MappingCacheStore, MemoryMappingCacheStore};
