//! Security module: statement deny-list enforcement.

mod classifier;

pub use classifier::{blocked_labels, blocked_message, classify, BlockedCommand};
