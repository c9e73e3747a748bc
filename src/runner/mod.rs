pub mod assertions;
pub mod call;
pub mod cancel;
pub mod pipeline;
pub mod reporter;
pub mod runtime;
pub mod types;

pub use assertions::StageOutcome;
pub use call::ApiCall;
pub use cancel::CancelToken;
pub use pipeline::Pipeline;
pub use reporter::RunReporter;
pub use runtime::Runtime;
pub use types::{AssertionRecord, RunSummary};
