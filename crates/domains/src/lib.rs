//! office-chat/crates/domains/src/lib.rs
//!
//! The central models and port definitions for office-chat.
//! No I/O happens here: adapters implement the ports, services orchestrate them.

pub mod attachment;
pub mod errors;
pub mod models;
pub mod ports;
pub mod roster;

// Re-exporting for easier access in other crates
pub use attachment::*;
pub use errors::*;
pub use models::*;
pub use ports::*;
pub use roster::*;
