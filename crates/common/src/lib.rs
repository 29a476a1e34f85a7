//! Common utilities shared by the certdx crates.
//!
//! - [`retry`]: bounded-attempt execution of fallible async operations
//! - [`observability`]: tracing subscriber setup
//! - [`build_info`]: version metadata injected at compile time

pub mod build_info;
pub mod observability;
pub mod retry;

pub use build_info::{BuildInfo, BUILD_INFO};
pub use retry::retry;
