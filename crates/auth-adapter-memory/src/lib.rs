// auth-adapter-memory — in-memory reference adapter.
//
// Keeps every entity in indexed maps behind a single lock. Used as the
// conformance baseline and for tests and prototyping; data is lost when the
// adapter is dropped.

pub mod adapter;

pub use adapter::{MemoryAdapter, MemorySnapshot};
