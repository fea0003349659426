//! Core types shared by every layer: the status taxonomy and small helpers

pub mod utils;
pub mod verdict;

pub use utils::{expand_home, format_memory, split_command, test_file_path};
pub use verdict::VerdictStatus;
