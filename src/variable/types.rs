use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

/// 环境中绑定的值
///
/// 标量以原生类型保存，JSON 对象、数组以及提取器得到的 JSON 值保存为 `Json`
#[derive(Debug, Clone, PartialEq)]
pub enum Binding {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Json(Value),
}

impl Binding {
    /// JSON 标量转换为原生类型，对象和数组保持为 JSON
    pub fn native(value: Value) -> Self {
        match value {
            Value::Null => Binding::Null,
            Value::Bool(b) => Binding::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Binding::Int(i),
                None => Binding::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => Binding::String(s),
            other => Binding::Json(other),
        }
    }

    /// 转换为 JSON 值，用于 `{@name@}` 整值替换和表达式求值
    pub fn to_json(&self) -> Value {
        match self {
            Binding::Null => Value::Null,
            Binding::Bool(b) => Value::Bool(*b),
            Binding::Int(i) => Value::from(*i),
            Binding::Float(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Binding::String(s) => Value::String(s.clone()),
            Binding::Json(v) => v.clone(),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Binding::Bool(b) => Some(*b),
            Binding::Json(Value::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    pub fn is_json(&self) -> bool {
        matches!(self, Binding::Json(_))
    }

    /// 类型名称，用于错误消息
    pub fn type_name(&self) -> &'static str {
        match self {
            Binding::Null => "null",
            Binding::Bool(_) => "boolean",
            Binding::Int(_) => "integer",
            Binding::Float(_) => "float",
            Binding::String(_) => "string",
            Binding::Json(_) => "json",
        }
    }
}

impl fmt::Display for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Binding::Null => write!(f, "null"),
            Binding::Bool(b) => write!(f, "{}", b),
            Binding::Int(i) => write!(f, "{}", i),
            Binding::Float(x) => write!(f, "{:?}", x),
            Binding::String(s) => write!(f, "{}", s),
            Binding::Json(v) => write!(f, "{}", v),
        }
    }
}

impl From<bool> for Binding {
    fn from(b: bool) -> Self {
        Binding::Bool(b)
    }
}

impl From<i64> for Binding {
    fn from(i: i64) -> Self {
        Binding::Int(i)
    }
}

impl From<u16> for Binding {
    fn from(i: u16) -> Self {
        Binding::Int(i64::from(i))
    }
}

impl From<f64> for Binding {
    fn from(x: f64) -> Self {
        Binding::Float(x)
    }
}

impl From<String> for Binding {
    fn from(s: String) -> Self {
        Binding::String(s)
    }
}

impl From<&str> for Binding {
    fn from(s: &str) -> Self {
        Binding::String(s.to_string())
    }
}

impl From<Value> for Binding {
    fn from(v: Value) -> Self {
        Binding::Json(v)
    }
}

/// 共享变量环境，在一次运行的所有脚本之间传递
#[derive(Debug, Clone, Default)]
pub struct Environment {
    bindings: HashMap<String, Binding>,
}

impl Environment {
    /// 创建新的空环境
    pub fn new() -> Self {
        Self::default()
    }

    /// 绑定变量，已有的同名绑定会被覆盖
    pub fn bind(&mut self, name: impl Into<String>, value: impl Into<Binding>) {
        self.bindings.insert(name.into(), value.into());
    }

    /// 解除绑定
    pub fn unbind(&mut self, name: &str) -> Option<Binding> {
        self.bindings.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&Binding> {
        self.bindings.get(name)
    }

    pub fn is_bound(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    /// 批量绑定字符串变量（来自配置文件和命令行）
    pub fn extend_strings<I>(&mut self, vars: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (name, value) in vars {
            self.bind(name, value);
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.bindings.keys().map(|k| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}
