use serde_json::Value;
use std::borrow::Cow;
use std::time::Duration;

use crate::http::{Headers, Method, Response};
use crate::runner::types::AssertionRecord;
use crate::{RavelError, Result};

/// 一个脚本的一次执行记录
///
/// 请求、响应与断言结果都记录在这里；运行结束后按执行顺序保存在 Runtime 的历史中。
#[derive(Debug, Clone, Default)]
pub struct ApiCall {
    /// 脚本名称
    pub script: String,

    pub method: Option<Method>,

    /// 展开后的 URI
    pub uri: Option<String>,

    pub request_headers: Headers,

    pub request_body: Option<Vec<u8>>,

    /// 响应状态码，未发送请求时为 None
    pub status: Option<u16>,

    pub response_headers: Headers,

    pub response_body: Vec<u8>,

    /// 请求耗时
    pub elapsed: Option<Duration>,

    pub passed: Vec<AssertionRecord>,

    pub failed: Vec<AssertionRecord>,

    pub skipped: Vec<AssertionRecord>,

    /// `if` 条件不满足，脚本未执行
    pub condition_skipped: bool,

    /// 硬错误消息
    pub error: Option<String>,

    pub canceled: bool,
}

impl ApiCall {
    pub fn new(script: impl Into<String>) -> Self {
        Self {
            script: script.into(),
            ..Self::default()
        }
    }

    /// 记录传输层返回的响应
    pub fn record_response(&mut self, response: Response) {
        self.status = Some(response.status.code());
        self.response_headers = response.headers;
        self.response_body = response.body;
        self.elapsed = Some(response.duration);
    }

    /// 响应体文本（非 UTF-8 字节按替换字符处理）
    pub fn response_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.response_body)
    }

    pub fn response_json(&self) -> Result<Value> {
        Ok(serde_json::from_slice(&self.response_body)?)
    }

    pub fn request_text(&self) -> Option<Cow<'_, str>> {
        self.request_body
            .as_deref()
            .map(String::from_utf8_lossy)
    }

    /// 是否真正发送了请求
    pub fn was_sent(&self) -> bool {
        self.status.is_some()
    }

    /// 没有失败的断言、硬错误或取消
    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && self.error.is_none() && !self.canceled
    }

    pub fn record_error(&mut self, error: &RavelError) {
        self.error = Some(error.to_string());
    }
}
