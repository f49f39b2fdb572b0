//! Core domain types: identifiers, task parameters, lifecycle states and the
//! execution context.

pub mod context;
pub mod environment;
pub mod params;
pub mod state;
pub mod types;
