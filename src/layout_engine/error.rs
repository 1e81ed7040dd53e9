use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum HistoryError {
    #[error("No stamp with creation order {0}")]
    UnknownStamp(u64),
    #[error("Nothing to undo")]
    NothingToUndo,
    #[error("Nothing to redo")]
    NothingToRedo,
    #[error("Stamp {0} is the root of the current history and cannot be deleted")]
    RootOfCurrent(u64),
    #[error("Invalid settings: {0}")]
    InvalidSettings(String),
}
