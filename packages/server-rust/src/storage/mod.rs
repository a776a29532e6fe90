//! Keyed storage backing the domain service.

pub mod hashmap;

pub use hashmap::HashMapStore;
