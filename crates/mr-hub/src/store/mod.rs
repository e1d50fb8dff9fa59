//! Durable store implementations
//!
//! The hub only sees the `InstanceStore`/`OutboxStore` traits. The bundled
//! in-memory implementation backs development and tests; a production
//! deployment points the same traits at the real persistence engine.

pub mod memory;

pub use memory::MemoryStore;
