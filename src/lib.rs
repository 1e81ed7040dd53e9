//! Incremental layout for a branching edit-history diagram.
//!
//! Every edit becomes a stamp in a forest that only ever grows sideways when the
//! user undoes and edits again. The [`layout_engine`] keeps each stamp's row,
//! column and horizontal position compact after every insertion or deletion
//! without recomputing the whole diagram.

pub mod common;
pub mod layout_engine;
pub mod model;
