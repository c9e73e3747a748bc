use serde_json::{Map, Value};

use crate::variable::{Environment, VariableResolver};
use crate::{RavelError, Result};

/// 模板名称的后缀，带此后缀的脚本只能被继承，不能直接运行
pub const TEMPLATE_SUFFIX: &str = ".template";

/// 隐式模板：加载后被所有未声明模板的脚本继承
pub const IMPLICIT_TEMPLATE: &str = "implicit.template";

/// 一个已加载的脚本
///
/// 脚本只保存 JSON 对象本身和模板名称；方法、URI、请求头等字段在运行时
/// 沿模板链解析，模板由 Runtime 的模板表持有。
#[derive(Debug, Clone, PartialEq)]
pub struct Script {
    name: String,
    root: Map<String, Value>,
    template: Option<String>,
}

impl Script {
    pub fn new(name: impl Into<String>, root: Map<String, Value>) -> Self {
        Self {
            name: name.into(),
            root,
            template: None,
        }
    }

    /// 从 JSON 值创建脚本
    ///
    /// - 值必须是对象
    /// - 缺少 `name` 时使用 `default_name`
    /// - `template` 先展开变量，缺少后缀时补上 `.template`
    pub fn from_value(
        value: Value,
        env: &Environment,
        default_name: impl FnOnce() -> String,
    ) -> Result<Self> {
        let root = match value {
            Value::Object(root) => root,
            other => {
                return Err(RavelError::ScriptError(format!(
                    "script must be a JSON object; found {}",
                    other
                )));
            }
        };

        let name = match root.get("name") {
            None | Some(Value::Null) => default_name(),
            Some(Value::String(name)) => name.clone(),
            Some(other) => {
                return Err(RavelError::ScriptError(format!(
                    "script name must be a string; found {}",
                    other
                )));
            }
        };

        let template = match root.get("template") {
            None | Some(Value::Null) => None,
            Some(Value::String(template)) => {
                let mut template = VariableResolver::expand(template, env);
                if !template.ends_with(TEMPLATE_SUFFIX) {
                    template.push_str(TEMPLATE_SUFFIX);
                }
                Some(template)
            }
            Some(other) => {
                return Err(RavelError::ScriptError(format!(
                    "template must be a template name string; found {}",
                    other
                )));
            }
        };

        Ok(Self {
            name,
            root,
            template,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root(&self) -> &Map<String, Value> {
        &self.root
    }

    /// 显式声明的模板名称
    pub fn template(&self) -> Option<&str> {
        self.template.as_deref()
    }

    /// 脚本自身的字段，`null` 视为未定义
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.root.get(key).filter(|v| !v.is_null())
    }

    pub fn is_template(&self) -> bool {
        self.name.ends_with(TEMPLATE_SUFFIX)
    }

    pub fn is_runnable(&self) -> bool {
        !self.is_template()
    }

    /// 继承的模板：显式模板优先，其次是隐式模板（隐式模板自身除外）
    pub fn parent_name(&self) -> Option<&str> {
        match &self.template {
            Some(template) => Some(template.as_str()),
            None if self.name != IMPLICIT_TEMPLATE => Some(IMPLICIT_TEMPLATE),
            None => None,
        }
    }

    /// 父模板是否由脚本显式声明
    pub fn has_explicit_template(&self) -> bool {
        self.template.is_some()
    }
}
