//! Evaluate code fragments in external interpreters, either in a fresh
//! process per fragment or in a long-lived session shared across fragments,
//! and hand back the printed output or the computed value.

pub mod codec;
pub mod config;
pub mod error;
pub mod execution;
pub mod printer;
pub mod process;
pub mod session;
pub mod utils;

pub use codec::{EvaluationResult, HostValue, Scalar, TableHeuristic};
pub use error::{EvalError, Result};
pub use execution::{Engine, EngineOptions, Evaluation, Fragment, ResultType};
pub use process::InterpreterType;
