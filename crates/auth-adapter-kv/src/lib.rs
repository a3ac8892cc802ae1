// auth-adapter-kv — adapter over a flat key-value store.
//
// Stores each record as a JSON document under a prefixed key, with secondary
// index keys for email lookups and per-user account and session lists. Any
// store offering get/set/set-if-absent/delete/take can back it; an in-process
// store is included for tests and development.

pub mod adapter;
pub mod options;
pub mod store;

pub use adapter::KeyValueAdapter;
pub use options::KeyValueAdapterOptions;
pub use store::{KeyValueStore, MemoryKeyValueStore, StoreError};
