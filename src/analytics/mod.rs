//! Pure scoring over a list of positions. No I/O.

mod allocation;
mod diversification;
mod models;
mod risk;
mod summary;

pub use allocation::{allocation, AllocationSlice};
pub use diversification::{diversification_score, DiversificationLevel};
pub use models::{AssetClass, PortfolioPosition};
pub use risk::{risk_score, risk_weight, RiskLevel};
pub use summary::{score_portfolio, PortfolioScores};
