//! Component Responses
//!
//! Detailed, client-facing views of stored components.

mod builder;

pub use builder::{ComponentDetails, ResponseBuilder};
