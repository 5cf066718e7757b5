//! # watch-keeper
//!
//! Durable watch subscriptions and session recovery on top of a
//! ZooKeeper-like coordination service.
//!
//! The service offers one-shot watches, drops ephemeral nodes when a session
//! dies, and reports session transitions on a single notification channel.
//! This crate keeps subscriptions alive across watch fires and reconnects:
//!
//! - **Child watches** - creation/deletion events computed by diffing child lists
//! - **Data watches** - re-armed after every fire, optionally for every child
//! - **Stubborn nodes** - ephemeral nodes recreated after each reconnection
//! - **Ordered dispatch** - listeners run on a worker pool, FIFO per path
//!
//! ## Key Types
//!
//! - [`CoordinationClient`] - the operations required from the service client
//! - [`WatchCoordinator`] - owns the registries and drives re-arming
//! - [`WatchSession`] - client facade with the create helpers and reconnection
//! - [`MemCoordinationClient`] - in-process service for tests and demos

mod adaptors;
mod client;
mod config;
mod errors;
mod utils;
mod watch;

pub use adaptors::*;
pub use client::*;
pub use config::*;
pub use errors::*;
pub use utils::*;
pub use watch::*;

//-----------------------------------------------------------
// Test utils

#[cfg(test)]
pub mod test_utils;
