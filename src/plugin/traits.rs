use serde_json::{Map, Value};
use std::fmt;

use crate::error::RavelError;
use crate::expr::Evaluator;
use crate::runner::ApiCall;
use crate::script::Script;
use crate::utils::ContentReader;
use crate::variable::Environment;

/// 断言执行的阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Preconditions,
    Assert,
}

impl Stage {
    /// 脚本中对应的字段名
    pub fn key(&self) -> &'static str {
        match self {
            Stage::Preconditions => "preconditions",
            Stage::Assert => "assert",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// 断言检查的结果
#[derive(Debug, thiserror::Error)]
pub enum CheckError {
    /// 断言不成立，记录为失败
    #[error("{0}")]
    Failed(String),

    /// 内部错误，中止当前脚本
    #[error(transparent)]
    Error(#[from] RavelError),
}

impl CheckError {
    pub fn failed(message: impl Into<String>) -> Self {
        CheckError::Failed(message.into())
    }
}

/// 插件调用时可访问的运行状态
pub struct CallContext<'a> {
    /// 当前调用
    pub call: &'a mut ApiCall,
    /// 共享变量环境
    pub env: &'a mut Environment,
    pub evaluator: &'a dyn Evaluator,
    pub reader: &'a dyn ContentReader,
}

impl CallContext<'_> {
    /// 展开文本中的变量引用
    pub fn expand(&self, text: &str) -> String {
        crate::variable::VariableResolver::expand(text, self.env)
    }
}

/// 断言插件
pub trait Assertion: Send {
    fn check(
        &self,
        script: &Script,
        directive: &Map<String, Value>,
        stage: Stage,
        call: &mut CallContext<'_>,
    ) -> Result<(), CheckError>;
}

/// 提取器插件，从响应中绑定新变量
pub trait Extractor: Send {
    fn extract(
        &self,
        script: &Script,
        directive: &Map<String, Value>,
        call: &mut CallContext<'_>,
    ) -> crate::Result<()>;
}

/// 认证插件，在发送前修改请求头
pub trait Authenticator: Send {
    fn authenticate(
        &self,
        script: &Script,
        directive: &Map<String, Value>,
        call: &mut CallContext<'_>,
    ) -> crate::Result<()>;
}

/// 请求体生成插件
pub trait BodyGenerator: Send {
    fn generate(
        &self,
        script: &Script,
        directive: &Map<String, Value>,
        call: &mut CallContext<'_>,
    ) -> crate::Result<Vec<u8>>;
}

/// 指令的第一个字段，即选择插件的关键字
pub fn first_field(directive: &Map<String, Value>) -> Option<(&str, &Value)> {
    directive.iter().next().map(|(k, v)| (k.as_str(), v))
}
