//! Configuration module for atlaswatch
//!
//! Provides types and parsing for `atlaswatch.toml` project configuration.

pub mod loader;
pub mod schema;

pub use loader::*;
pub use schema::*;
