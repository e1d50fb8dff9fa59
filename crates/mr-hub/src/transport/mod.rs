//! Transport implementations
//!
//! The hub talks to transports only through the `mr_core::traits::Transport`
//! seam. The bundled implementation is an in-process simulator used for
//! development and tests; a production deployment substitutes a real
//! chat-protocol client behind the same trait.

pub mod sim;

pub use sim::{SimController, SimTransportFactory};
