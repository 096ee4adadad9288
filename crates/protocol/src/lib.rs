//! Flarecast Protocol
//!
//! Shared types for communication between the Flarecast overlay server and
//! its browser clients. These types are serialized as JSON over WebSocket.

pub mod types;
pub mod wire;

pub use types::*;
pub use wire::WireMessage;
