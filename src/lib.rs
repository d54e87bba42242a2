pub mod analytics;
pub mod clock;
pub mod config;
pub mod duration;
pub mod error;
pub mod jobs;
pub mod market_data;
pub mod models;
pub mod portfolio;
pub mod replay;
pub mod storage;
pub mod symbols;
