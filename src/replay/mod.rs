//! Chronological transaction replay: day-by-day holdings from a starting
//! state and a list of buy/sell events.

mod engine;
mod models;

pub use engine::{replay, unwind_to_opening};
pub use models::{
    HoldingState, Position, PositionBook, ReplayOptions, ReplayResult, ReplayWarning,
    SameDayOrder,
};
