use std::time::Instant;

use async_trait::async_trait;

use crate::Result;
use crate::http::headers::Headers;
use crate::http::request::Request;
use crate::http::response::Response;
use crate::http::types::{Method, Status};
use crate::variable::HttpSettings;

/// GET/HEAD 最多跟随的重定向次数
const MAX_REDIRECTS: usize = 10;

#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("timeout")]
    Timeout,
    #[error("connect/dns/tls error: {0}")]
    Network(String),
    #[error("invalid uri '{uri}': {reason}")]
    InvalidUri { uri: String, reason: String },
    #[error("http error: {0}")]
    Other(String),
}

/// 发送已解析的请求，返回服务器的响应
///
/// 4xx/5xx 响应同样以 `Ok` 返回；只有完全拿不到响应时才是错误。
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: Request) -> std::result::Result<Response, TransportError>;
}

pub struct ReqwestTransport {
    /// 跟随重定向，用于 GET 和 HEAD
    follow: reqwest::Client,
    /// 从不跟随重定向
    direct: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(settings: &HttpSettings) -> Result<Self> {
        let follow_policy = if settings.follow_redirects {
            reqwest::redirect::Policy::limited(MAX_REDIRECTS)
        } else {
            reqwest::redirect::Policy::none()
        };

        let follow = reqwest::Client::builder()
            .timeout(settings.timeout())
            .redirect(follow_policy)
            .user_agent(concat!("ravel/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let direct = reqwest::Client::builder()
            .timeout(settings.timeout())
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(concat!("ravel/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { follow, direct })
    }

    fn client_for(&self, method: Method) -> &reqwest::Client {
        if method.is_safe() {
            &self.follow
        } else {
            &self.direct
        }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: Request) -> std::result::Result<Response, TransportError> {
        url::Url::parse(&request.uri).map_err(|e| TransportError::InvalidUri {
            uri: request.uri.clone(),
            reason: e.to_string(),
        })?;

        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Head => reqwest::Method::HEAD,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
            Method::Patch => reqwest::Method::PATCH,
            Method::Options => reqwest::Method::OPTIONS,
            Method::Trace => reqwest::Method::TRACE,
        };

        let mut builder = self
            .client_for(request.method)
            .request(method, request.uri.as_str());
        for (name, value) in request.headers.iter() {
            builder = builder.header(name, value);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let start = Instant::now();
        let response = builder.send().await.map_err(map_reqwest_error)?;

        let code = response.status().as_u16();
        let status = Status::new(code).map_err(|e| TransportError::Other(e.to_string()))?;
        let headers = Headers::from(response.headers());
        let body = response
            .bytes()
            .await
            .map(|bytes| bytes.to_vec())
            .map_err(map_reqwest_error);
        let duration = start.elapsed();

        tracing::debug!("{} {} -> {} in {:?}", request.method, request.uri, code, duration);

        Ok(finish_response(status, headers, body, duration))
    }
}

/// 读取响应体失败时保留已收到的状态码和响应头，响应体置空
fn finish_response(
    status: Status,
    headers: Headers,
    body: std::result::Result<Vec<u8>, TransportError>,
    duration: std::time::Duration,
) -> Response {
    let body = body.unwrap_or_else(|e| {
        tracing::warn!(
            "Reading response body for HTTP status {} failed: {}",
            status.code(),
            e
        );
        Vec::new()
    });
    Response::new(status, headers, body, duration)
}

fn map_reqwest_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        return TransportError::Timeout;
    }
    if e.is_connect() || e.is_request() {
        return TransportError::Network(e.to_string());
    }
    TransportError::Other(e.to_string())
}
