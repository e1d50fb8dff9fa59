//! Trait seams for external collaborators
//!
//! The real chat-protocol client and the relational persistence engine
//! live outside this system. These traits are the boundary: the hub only
//! ever talks to a `Transport` and to the two store abstractions.

mod store;
mod transport;

pub use store::{InstanceStore, OutboxStore};
pub use transport::{Transport, TransportEvent, TransportFactory};
