//! Data Transfer Objects for REST response serialization.

pub mod registry_dto;
pub mod status_dto;

pub use registry_dto::*;
pub use status_dto::*;
