//! Default store implementations.

mod memory;

pub use memory::{InMemoryBlockStore, InMemoryFlowStore, InMemoryLogStore};
