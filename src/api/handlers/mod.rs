//! REST endpoint handlers.

pub mod registry;
pub mod system;
