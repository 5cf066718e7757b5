pub mod mem_coordination_client;

pub use mem_coordination_client::*;
