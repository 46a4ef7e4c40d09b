// # Store Implementations
//
// This module provides implementations of the StatusStore, LogStore and
// OutageStore traits for different persistence strategies. Each store
// implements all three traits over one shared set of records.

mod data;
pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;
