//! Historical actuals and their CSV loader

mod data;
pub mod loader;

pub use data::{HistoricalData, HistoricalYear};
pub use loader::{load_default_history, load_history, load_history_from_reader};
