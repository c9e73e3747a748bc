pub mod builtin;
pub mod registry;
pub mod traits;

pub use registry::{PluginFactory, PluginKind, PluginRegistry};
pub use traits::{
    Assertion, Authenticator, BodyGenerator, CallContext, CheckError, Extractor, Stage,
    first_field,
};
