//! Local filesystem helpers: tree walking and working-directory cleanup.

pub mod cleanup;
pub mod walker;

pub use cleanup::remove_work_dir;
pub use walker::{walk_local_tree, LocalNode, WalkError};
