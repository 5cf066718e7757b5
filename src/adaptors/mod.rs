pub mod mem;

pub use mem::*;
