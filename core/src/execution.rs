//! Execution adapters.
//!
//! Each language binds one [`ExecutionAdapter`]. Adapters never fail: whatever
//! goes wrong while running candidate code comes back as an `error` line in
//! the captured output.

pub mod adapter;
pub mod javascript;
pub mod outcome;
pub mod python;
pub mod registry;

pub use adapter::*;
pub use javascript::JavaScriptAdapter;
pub use outcome::*;
pub use python::{PythonAdapter, PythonInterpreter};
pub use registry::*;

#[cfg(test)]
pub(crate) mod mock;
