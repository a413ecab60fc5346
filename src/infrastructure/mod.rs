//! Adapters standing in for the platform: an in-memory catalog service and a
//! sandbox payment queue.

pub mod in_memory;
pub mod sandbox;
