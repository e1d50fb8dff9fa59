//! mr-hub: Local daemon managing messaging provider sessions
//!
//! The hub owns every instance session, keeps each one paired and
//! connected to its provider, and exposes a localhost HTTP API for the
//! CLI and external integrators. Message delivery goes through a
//! durable outbox so callers never talk to a transport directly.

pub mod dispatch;
pub mod health;
pub mod http;
pub mod publish;
pub mod registry;
pub mod session;
pub mod state;
pub mod store;
pub mod transport;

pub use registry::SessionRegistry;
pub use state::HubState;
