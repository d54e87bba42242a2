pub mod eodhd;

pub use eodhd::EodhdPriceFeed;
