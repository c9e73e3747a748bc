pub mod client;
pub mod headers;
pub mod request;
pub mod response;
pub mod types;

// 重新导出常用类型
pub use client::{ReqwestTransport, Transport, TransportError};
pub use headers::Headers;
pub use request::Request;
pub use response::Response;
pub use types::{Method, Status};
