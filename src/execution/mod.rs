//! Subtask execution.
//!
//! This module provides the command-adapter boundary, a subprocess adapter,
//! and the executor that ties a command run to its lifecycle effect.

mod adapter;
mod error;
mod executor;
mod process;

pub use adapter::{AdapterError, CommandAdapter, CommandOutput, Invocation};
pub use error::{ExecutionError, SubTaskError, ValidationError};
pub use executor::{SubTaskExecutor, SubTaskOutcome};
pub use process::{ProcessAdapter, ProcessAdapterBuilder};
