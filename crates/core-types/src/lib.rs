// In crates/core-types/src/lib.rs

pub mod de;
pub mod error;
pub mod types;

// Re-export the most important types for easy access from other crates.
pub use error::{Error, Result};
pub use types::{
    BotStatus, ControlAck, EquityPoint, Fill, MarketMidPoint, MarketPair, OrderAttempt,
    PerformanceSummary, RunConfig, RunDetail, RunId, RunList, RunMeta, RunSummary, Side,
    TimeSeries,
};
