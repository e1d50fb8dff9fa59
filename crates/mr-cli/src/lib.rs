//! mr-cli: Command-line interface for m-relay
//!
//! Provides the `m-relay` CLI for managing instances on a running hub
//! and sending messages through it.

pub mod client;
pub mod commands;
pub mod output;
