//! Infrastructure layer for cross-cutting concerns.

pub mod error;

pub use error::{SignError, SignResult};
