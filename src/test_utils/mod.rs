//! the test_utils folder here will share utils or test components between
//! unit tests
mod common;
mod listener;

pub use common::*;
pub use listener::*;
