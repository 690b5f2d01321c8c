//! Shared types for the channel integration layer.
//!
//! This crate defines the connection record, the uniform response envelope
//! and the strongly-typed error enums shared across the workspace.

pub mod connection;
pub mod error;
pub mod response;

/// Re-export of connection binding types.
pub use connection::{ChannelConnection, Environment};
/// Re-export of all error types.
pub use error::*;
/// Re-export of envelope types.
pub use response::{ChannelResponse, Payload};
