pub mod config;
pub mod resolver;
pub mod types;

pub use config::{ConfigLoader, HttpSettings, Profile, RavelConfig};
pub use resolver::VariableResolver;
pub use types::{Binding, Environment};
