//! API Module
//!
//! REST surface over the component synchronizer.

pub mod rest;
pub mod server;

pub use rest::*;
pub use server::*;
