//! Structural operations over [`DynamicMessage`](crate::message::DynamicMessage)
//! that reuse descriptors rather than copying bits (spec §4.6-§4.10).

pub mod clone;
pub mod equal;
pub mod initialized;
pub mod merge;
pub mod reset;
