//! Testing utilities and mock implementations
//!
//! Lets pipelines and agents be exercised without network access or
//! credentials.

pub mod mocks;

pub use mocks::*;
