pub mod error;
pub mod expr;
pub mod http;
pub mod logger;
pub mod plugin;
pub mod runner;
pub mod script;
pub mod utils;
pub mod variable;

// Re-export commonly used types
pub use error::{RavelError, Result};
pub use runner::{ApiCall, CancelToken, RunSummary, Runtime};
pub use script::Script;
pub use variable::{Binding, Environment, VariableResolver};
