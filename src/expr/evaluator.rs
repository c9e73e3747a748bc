use crate::expr::parser::parse_expr;
use crate::expr::types::{EvalError, Expr, ExprValue, Operand, ValuePath};
use crate::variable::{Binding, Environment, VariableResolver};
use serde_json::Value;

/// 表达式求值器，用于 `if` 条件和表达式断言
pub trait Evaluator: Send + Sync {
    fn eval(&self, expression: &str, env: &Environment) -> Result<Binding, EvalError>;
}

/// 默认求值器：先展开变量引用，再按简单比较语法求值
#[derive(Debug, Default, Clone, Copy)]
pub struct SimpleEvaluator;

impl Evaluator for SimpleEvaluator {
    fn eval(&self, expression: &str, env: &Environment) -> Result<Binding, EvalError> {
        let expanded = VariableResolver::expand(expression, env);
        let expr = parse_expr(&expanded)?;
        evaluate(&expr, env)
    }
}

/// 对已解析的表达式求值
pub fn evaluate(expr: &Expr, env: &Environment) -> Result<Binding, EvalError> {
    match expr {
        Expr::Value(Operand::Literal(value)) => Ok(value.clone().into_binding()),

        Expr::Value(Operand::Path(path)) => {
            let name = path.to_string();
            if let Some(binding) = env.get(&name) {
                return Ok(binding.clone());
            }
            lookup_path(path, env)
                .map(Binding::native)
                .ok_or(EvalError::PathNotFound(name))
        }

        Expr::Compare { left, op, right } => {
            let left = operand_value(left, env)?;
            let right = operand_value(right, env)?;
            Ok(Binding::Bool(left.compare(*op, &right)?))
        }

        Expr::Exists(path) => Ok(Binding::Bool(lookup_path(path, env).is_some())),
    }
}

fn operand_value(operand: &Operand, env: &Environment) -> Result<ExprValue, EvalError> {
    match operand {
        Operand::Literal(value) => Ok(value.clone()),
        Operand::Path(path) => {
            let name = path.to_string();
            let value =
                lookup_path(path, env).ok_or_else(|| EvalError::PathNotFound(name.clone()))?;
            ExprValue::from_json(&value, &name)
        }
    }
}

/// 在环境中查找路径：匹配最长的已绑定前缀，剩余段在 JSON 中逐级查找
fn lookup_path(path: &ValuePath, env: &Environment) -> Option<Value> {
    let segments = &path.segments;

    for split in (1..=segments.len()).rev() {
        let name = segments[..split].join(".");
        let Some(binding) = env.get(&name) else {
            continue;
        };

        let mut current = binding.to_json();
        for segment in &segments[split..] {
            current = match current {
                Value::Object(mut map) => map.remove(segment)?,
                Value::Array(mut items) => {
                    let index: usize = segment.parse().ok()?;
                    if index >= items.len() {
                        return None;
                    }
                    items.swap_remove(index)
                }
                _ => return None,
            };
        }
        return Some(current);
    }

    None
}
