use crate::variable::Binding;
use serde_json::Value;
use std::fmt;

/// 表达式错误类型
#[derive(Debug, Clone, thiserror::Error)]
pub enum EvalError {
    #[error("Invalid expression syntax: {0}")]
    InvalidSyntax(String),

    #[error("Invalid operator: {0}")]
    InvalidOperator(String),

    #[error("Path not found: {0}")]
    PathNotFound(String),

    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    #[error("Cannot compare {0}: arrays and objects are not comparable")]
    NotComparable(String),
}

/// 表达式
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// 单个值：字面量或变量路径
    Value(Operand),
    /// 比较: left op right
    Compare {
        left: Operand,
        op: CompareOp,
        right: Operand,
    },
    /// 存在性: path exists
    Exists(ValuePath),
}

/// 比较的一侧
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Path(ValuePath),
    Literal(ExprValue),
}

/// 变量路径，点号分隔
///
/// 变量名本身可以包含 `.`，求值时优先匹配最长的已绑定前缀，剩余部分在 JSON 值中逐级查找
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValuePath {
    pub segments: Vec<String>,
}

impl ValuePath {
    pub fn parse(input: &str) -> Self {
        Self {
            segments: input.split('.').map(|s| s.to_string()).collect(),
        }
    }
}

impl fmt::Display for ValuePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}

/// 比较运算符
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Equal,          // ==
    NotEqual,       // !=
    Greater,        // >
    Less,           // <
    GreaterOrEqual, // >=
    LessOrEqual,    // <=
    Contains,       // contains
}

impl CompareOp {
    /// 从字符串解析运算符
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "==" => Some(Self::Equal),
            "!=" => Some(Self::NotEqual),
            ">" => Some(Self::Greater),
            "<" => Some(Self::Less),
            ">=" => Some(Self::GreaterOrEqual),
            "<=" => Some(Self::LessOrEqual),
            "contains" => Some(Self::Contains),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Equal => "==",
            Self::NotEqual => "!=",
            Self::Greater => ">",
            Self::Less => "<",
            Self::GreaterOrEqual => ">=",
            Self::LessOrEqual => "<=",
            Self::Contains => "contains",
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 可比较的标量值
#[derive(Debug, Clone, PartialEq)]
pub enum ExprValue {
    Number(f64),
    String(String),
    Bool(bool),
    Null,
}

impl fmt::Display for ExprValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExprValue::Number(n) => write!(f, "{}", n),
            ExprValue::String(s) => write!(f, "\"{}\"", s),
            ExprValue::Bool(b) => write!(f, "{}", b),
            ExprValue::Null => write!(f, "null"),
        }
    }
}

impl ExprValue {
    /// 从 JSON 值转换，数组和对象不可比较
    pub fn from_json(value: &Value, path: &str) -> Result<Self, EvalError> {
        match value {
            Value::Number(n) => n
                .as_f64()
                .map(ExprValue::Number)
                .ok_or_else(|| EvalError::NotComparable(path.to_string())),
            Value::String(s) => Ok(ExprValue::String(s.clone())),
            Value::Bool(b) => Ok(ExprValue::Bool(*b)),
            Value::Null => Ok(ExprValue::Null),
            Value::Array(_) | Value::Object(_) => Err(EvalError::NotComparable(path.to_string())),
        }
    }

    pub fn into_binding(self) -> Binding {
        match self {
            ExprValue::Number(n) if n.fract() == 0.0 && n.abs() < i64::MAX as f64 => {
                Binding::Int(n as i64)
            }
            ExprValue::Number(n) => Binding::Float(n),
            ExprValue::String(s) => Binding::String(s),
            ExprValue::Bool(b) => Binding::Bool(b),
            ExprValue::Null => Binding::Null,
        }
    }

    /// 比较两个值
    pub fn compare(&self, op: CompareOp, other: &ExprValue) -> Result<bool, EvalError> {
        match (self, other) {
            (ExprValue::Number(a), ExprValue::Number(b)) => Ok(match op {
                CompareOp::Equal => (a - b).abs() < f64::EPSILON,
                CompareOp::NotEqual => (a - b).abs() >= f64::EPSILON,
                CompareOp::Greater => a > b,
                CompareOp::Less => a < b,
                CompareOp::GreaterOrEqual => a >= b,
                CompareOp::LessOrEqual => a <= b,
                CompareOp::Contains => {
                    return Err(EvalError::TypeMismatch {
                        expected: "string".to_string(),
                        actual: "number".to_string(),
                    });
                }
            }),

            (ExprValue::String(a), ExprValue::String(b)) => Ok(match op {
                CompareOp::Equal => a == b,
                CompareOp::NotEqual => a != b,
                CompareOp::Contains => a.contains(b.as_str()),
                CompareOp::Greater => a > b,
                CompareOp::Less => a < b,
                CompareOp::GreaterOrEqual => a >= b,
                CompareOp::LessOrEqual => a <= b,
            }),

            (ExprValue::Bool(a), ExprValue::Bool(b)) => Ok(match op {
                CompareOp::Equal => a == b,
                CompareOp::NotEqual => a != b,
                _ => {
                    return Err(EvalError::InvalidOperator(format!(
                        "Operator {} not supported for boolean values",
                        op
                    )));
                }
            }),

            (ExprValue::Null, ExprValue::Null) => Ok(match op {
                CompareOp::Equal => true,
                CompareOp::NotEqual => false,
                _ => {
                    return Err(EvalError::InvalidOperator(format!(
                        "Operator {} not supported for null",
                        op
                    )));
                }
            }),

            (ExprValue::Null, _) | (_, ExprValue::Null) => Ok(match op {
                CompareOp::Equal => false,
                CompareOp::NotEqual => true,
                _ => {
                    return Err(EvalError::InvalidOperator(format!(
                        "Operator {} not supported for null comparison",
                        op
                    )));
                }
            }),

            _ => Err(EvalError::TypeMismatch {
                expected: format!("{:?}", other),
                actual: format!("{:?}", self),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_compare_op_parse() {
        assert_eq!(CompareOp::parse("=="), Some(CompareOp::Equal));
        assert_eq!(CompareOp::parse("!="), Some(CompareOp::NotEqual));
        assert_eq!(CompareOp::parse(">="), Some(CompareOp::GreaterOrEqual));
        assert_eq!(CompareOp::parse("contains"), Some(CompareOp::Contains));
        assert_eq!(CompareOp::parse("=~"), None);
    }

    #[test]
    fn test_compare_numbers() {
        let a = ExprValue::Number(10.0);
        let b = ExprValue::Number(5.0);

        assert!(a.compare(CompareOp::Greater, &b).unwrap());
        assert!(b.compare(CompareOp::LessOrEqual, &a).unwrap());
        assert!(!a.compare(CompareOp::Equal, &b).unwrap());
        assert!(a.compare(CompareOp::Contains, &b).is_err());
    }

    #[test]
    fn test_compare_strings() {
        let a = ExprValue::String("hello world".to_string());
        let b = ExprValue::String("world".to_string());

        assert!(a.compare(CompareOp::Contains, &b).unwrap());
        assert!(!a.compare(CompareOp::Equal, &b).unwrap());
    }

    #[test]
    fn test_compare_mismatched_types() {
        let a = ExprValue::Number(1.0);
        let b = ExprValue::String("1".to_string());
        assert!(matches!(
            a.compare(CompareOp::Equal, &b),
            Err(EvalError::TypeMismatch { .. })
        ));
        assert!(!a.compare(CompareOp::Equal, &ExprValue::Null).unwrap());
    }

    #[test]
    fn test_from_json() {
        assert_eq!(
            ExprValue::from_json(&json!(3), "x").unwrap(),
            ExprValue::Number(3.0)
        );
        assert!(ExprValue::from_json(&json!({"a": 1}), "x").is_err());
    }

    #[test]
    fn test_into_binding() {
        assert_eq!(ExprValue::Number(4.0).into_binding(), Binding::Int(4));
        assert_eq!(ExprValue::Number(0.5).into_binding(), Binding::Float(0.5));
    }

    #[test]
    fn test_value_path_display() {
        let path = ValuePath::parse("user.address.city");
        assert_eq!(path.segments.len(), 3);
        assert_eq!(path.to_string(), "user.address.city");
    }
}
