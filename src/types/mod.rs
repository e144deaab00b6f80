//! Core types for testsmith.

pub mod message;
pub mod stream;

pub use message::*;
pub use stream::*;
