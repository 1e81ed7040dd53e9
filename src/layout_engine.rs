mod board;
mod compaction;
pub mod engine;
mod error;
mod placement;

pub use board::{Board, Extent};
pub use compaction::ShiftFlags;
pub use engine::{DeleteOptions, Edit, EventResponse, HistoryCommand, LayoutEngine, StampView};
pub use error::HistoryError;

#[cfg(test)]
mod tests;
