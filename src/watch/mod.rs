//! Durable watches on top of one-shot watches
//!
//! The coordination service only offers one-shot watches: a `get_data` or
//! `get_children` call with `watch = true` arms a single notification that
//! fires at most once. This module turns them into subscriptions that keep
//! delivering events until explicitly removed, across watch fires and
//! session loss.
//!
//! # Architecture Overview
//!
//! ```text
//! ┌──────────────────┐  fire   ┌──────────────────┐ re-arm + fetch ┌──────────────────┐
//! │ notification chan├────────►│ WatchCoordinator ├───────────────►│CoordinationClient│
//! └──────────────────┘         └────────┬─────────┘                └──────────────────┘
//!                                       │ diff_children(known, snapshot)
//!                                       ▼
//!                              ┌──────────────────┐ hash(path) ┌──────────────┐
//!                              │    Dispatcher    ├───────────►│ worker i     ├─► Listener
//!                              └──────────────────┘            └──────────────┘
//! ```
//!
//! - [`WatchCoordinator`]: listen / unlisten / relisten / stubborn nodes /
//!   session-state listeners
//! - `registry`: per-path subscription state in two `DashMap`s
//! - [`diff_children`]: exact creation/deletion sets between two child lists
//! - [`Dispatcher`]: ordered worker pool, one FIFO per path
//!
//! # Thread Safety
//!
//! Every type here is `Send + Sync`. Registries use `DashMap` (per-key
//! atomicity); diff passes of one path are serialized by a per-subscription
//! lock that is never held while a listener runs.

mod coordinator;
mod diff;
mod dispatcher;
mod listener;
mod registry;
mod state;
mod stubborn;


pub use coordinator::WatchCoordinator;
pub use diff::diff_children;
pub use diff::ChildDiff;
pub use diff::Delivery;
pub use dispatcher::Dispatcher;
pub use listener::*;
pub use stubborn::StubbornNode;
