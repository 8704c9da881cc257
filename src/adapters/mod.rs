// Adapters layer: concrete Store implementations for the hosted database and for tests.

pub mod memory;
pub mod rest;

pub use memory::InMemoryStore;
pub use rest::RestStore;
