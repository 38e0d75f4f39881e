//! Comparison engine.
//!
//! Aggregation feeds both the composite scorer and the winner decider;
//! the two consumers are independent of each other.

pub mod aggregator;
pub mod presets;
pub mod scheme;
pub mod scorer;
pub mod winner;

pub use aggregator::*;
pub use presets::*;
pub use scheme::*;
pub use scorer::*;
pub use winner::*;
