// # Notification Channel Implementations
//
// Only the in-process channel lives in core; broker-backed channels ship as
// plugin crates.

pub mod memory;

pub use memory::{MemoryChannel, MemoryChannelFactory};
