use thiserror::Error;

use crate::expr::EvalError;
use crate::http::TransportError;
use crate::plugin::PluginKind;

#[derive(Error, Debug)]
pub enum RavelError {
    #[error("脚本格式错误: {0}")]
    ScriptError(String),

    #[error("未注册的 {kind} 插件: {keyword}")]
    UnknownPlugin { kind: PluginKind, keyword: String },

    #[error("无效的 if 条件: {0}")]
    InvalidCondition(String),

    #[error("无效的 HTTP 方法: {0}")]
    InvalidMethod(String),

    #[error("找不到模板: {0}")]
    TemplateNotFound(String),

    #[error("找不到脚本: {0}")]
    ScriptNotFound(String),

    #[error("表达式求值失败: {0}")]
    EvalError(#[from] EvalError),

    #[error("HTTP 请求失败: {0}")]
    TransportError(#[from] TransportError),

    #[error("HTTP 客户端初始化失败: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("内容读取失败: {0}")]
    ContentError(String),

    #[error("配置错误: {0}")]
    ConfigError(String),

    #[error("IO 错误: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON 解析错误: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("URL 解析错误: {0}")]
    UrlParseError(#[from] url::ParseError),

    #[error("{0}")]
    Other(String),
}

impl From<anyhow::Error> for RavelError {
    fn from(err: anyhow::Error) -> Self {
        RavelError::Other(err.to_string())
    }
}

/// Result type for ravel crate
pub type Result<T> = std::result::Result<T, RavelError>;
