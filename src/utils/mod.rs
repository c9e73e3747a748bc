pub mod content;
pub mod formatter;

pub use content::{ContentReader, FsContentReader, REDIRECT_PREFIX, redirect_target};
pub use formatter::{ResponseFormat, ResponseFormatter, is_textual, loggable_header_value, pretty_body};
