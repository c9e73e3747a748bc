use regex::Regex;
use serde_json::{Map, Value};

use crate::RavelError;
use crate::plugin::traits::{Assertion, CallContext, CheckError, Stage, first_field};
use crate::script::Script;
use crate::variable::VariableResolver;

/// 默认状态码模式
const DEFAULT_STATUS_PATTERN: &str = "2..";

/// 整串匹配的正则
pub(crate) fn full_match(pattern: &str) -> Result<Regex, RavelError> {
    Regex::new(&format!("^(?:{})$", pattern))
        .map_err(|e| RavelError::ScriptError(format!("Invalid regular expression {}: {}", pattern, e)))
}

fn directive_value<'a>(directive: &'a Map<String, Value>) -> &'a Value {
    first_field(directive).map(|(_, v)| v).unwrap_or(&Value::Null)
}

/// `{"status": 201}`、`{"status": [200, 204]}`、`{"status": "2.."}`
pub struct StatusAssertion;

impl StatusAssertion {
    fn matches(code: u16, expected: &Value, call: &CallContext<'_>) -> Result<bool, RavelError> {
        match expected {
            Value::Null => Ok(full_match(DEFAULT_STATUS_PATTERN)?.is_match(&code.to_string())),
            Value::Number(n) => Ok(n.as_u64() == Some(u64::from(code))),
            Value::String(pattern) => {
                Ok(full_match(&call.expand(pattern))?.is_match(&code.to_string()))
            }
            Value::Array(items) => {
                for item in items {
                    if Self::matches(code, item, call)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            other => Err(RavelError::ScriptError(format!(
                "status value must be a number, an array or a pattern; found {}",
                other
            ))),
        }
    }
}

impl Assertion for StatusAssertion {
    fn check(
        &self,
        _script: &Script,
        directive: &Map<String, Value>,
        _stage: Stage,
        call: &mut CallContext<'_>,
    ) -> Result<(), CheckError> {
        let expected = directive_value(directive);
        let Some(code) = call.call.status else {
            return Err(CheckError::failed("no HTTP status available"));
        };

        if Self::matches(code, expected, call)? {
            Ok(())
        } else {
            Err(CheckError::failed(format!(
                "http status {} does not match {}",
                code, expected
            )))
        }
    }
}

/// `{"headers": {"Content-Type": "application/json.*"}}`
///
/// 头名不区分大小写，值按正则整串匹配任一取值。
pub struct HeadersAssertion;

impl Assertion for HeadersAssertion {
    fn check(
        &self,
        _script: &Script,
        directive: &Map<String, Value>,
        _stage: Stage,
        call: &mut CallContext<'_>,
    ) -> Result<(), CheckError> {
        let Value::Object(spec) = directive_value(directive) else {
            return Err(RavelError::ScriptError(
                "headers assertion requires an object of header patterns".to_string(),
            )
            .into());
        };

        for (name, pattern) in spec {
            let Value::String(pattern) = pattern else {
                return Err(RavelError::ScriptError(format!(
                    "header value {} is not a string (regular expression expected)",
                    pattern
                ))
                .into());
            };
            let pattern = call.expand(pattern);
            let re = full_match(&pattern)?;

            let values = call.call.response_headers.get_all(name);
            if values.is_empty() {
                return Err(CheckError::failed(format!(
                    "Required header {} not found",
                    name
                )));
            }
            if !values.iter().any(|v| re.is_match(v)) {
                return Err(CheckError::failed(format!(
                    "header {} does not match required pattern {}",
                    name, pattern
                )));
            }
            tracing::trace!("header {} matches required pattern {}", name, pattern);
        }
        Ok(())
    }
}

/// `{"expr": "count > 0"}`，字符串形式的断言也由它执行
pub struct ExprAssertion;

impl Assertion for ExprAssertion {
    fn check(
        &self,
        _script: &Script,
        directive: &Map<String, Value>,
        _stage: Stage,
        call: &mut CallContext<'_>,
    ) -> Result<(), CheckError> {
        let expressions: Vec<&str> = match directive_value(directive) {
            Value::String(s) => vec![s.as_str()],
            Value::Array(items) => items.iter().filter_map(Value::as_str).collect(),
            other => {
                return Err(RavelError::ScriptError(format!(
                    "expr assertion requires a string; found {}",
                    other
                ))
                .into());
            }
        };

        for expression in expressions {
            let result = call
                .evaluator
                .eval(expression, call.env)
                .map_err(RavelError::from)?;
            match result.as_bool() {
                Some(true) => {}
                Some(false) => {
                    return Err(CheckError::failed(format!(
                        "expression '{}' is false",
                        expression
                    )));
                }
                None => {
                    return Err(RavelError::InvalidCondition(format!(
                        "expression '{}' returned {} instead of a boolean",
                        expression,
                        result.type_name()
                    ))
                    .into());
                }
            }
        }
        Ok(())
    }
}

/// `{"bound": "token"}` 或 `{"bound": ["a", "b"]}`
pub struct BoundAssertion;

impl Assertion for BoundAssertion {
    fn check(
        &self,
        _script: &Script,
        directive: &Map<String, Value>,
        _stage: Stage,
        call: &mut CallContext<'_>,
    ) -> Result<(), CheckError> {
        let names: Vec<&Value> = match directive_value(directive) {
            Value::Array(items) => items.iter().collect(),
            single => vec![single],
        };

        for name in names {
            let Value::String(name) = name else {
                return Err(RavelError::ScriptError(format!(
                    "bound assertion expects variable names; found {}",
                    name
                ))
                .into());
            };
            if !call.env.is_bound(name) {
                return Err(CheckError::failed(format!("variable {} is not bound", name)));
            }
        }
        Ok(())
    }
}

/// `{"equal": [a, b]}`，两侧先展开；任一侧为字符串时按文本比较
pub struct EqualAssertion;

impl EqualAssertion {
    fn textual(value: &Value) -> String {
        match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

impl Assertion for EqualAssertion {
    fn check(
        &self,
        _script: &Script,
        directive: &Map<String, Value>,
        _stage: Stage,
        call: &mut CallContext<'_>,
    ) -> Result<(), CheckError> {
        let pair = match directive_value(directive) {
            Value::Array(items) if items.len() == 2 => items,
            other => {
                return Err(RavelError::ScriptError(format!(
                    "equal assertion requires an array of two values; found {}",
                    other
                ))
                .into());
            }
        };

        let left = VariableResolver::substitute_json(&pair[0], call.env);
        let right = VariableResolver::substitute_json(&pair[1], call.env);

        let equal = if left.is_string() || right.is_string() {
            Self::textual(&left) == Self::textual(&right)
        } else {
            left == right
        };

        if equal {
            Ok(())
        } else {
            Err(CheckError::failed(format!("{} is not equal to {}", left, right)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::SimpleEvaluator;
    use crate::runner::ApiCall;
    use crate::utils::FsContentReader;
    use crate::variable::Environment;
    use serde_json::json;

    fn script() -> Script {
        Script::new("test", Map::new())
    }

    fn directive(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    fn check(
        assertion: &dyn Assertion,
        d: Value,
        call: &mut ApiCall,
        env: &mut Environment,
    ) -> Result<(), CheckError> {
        let reader = FsContentReader::new();
        let mut ctx = CallContext {
            call,
            env,
            evaluator: &SimpleEvaluator,
            reader: &reader,
        };
        assertion.check(&script(), &directive(d), Stage::Assert, &mut ctx)
    }

    fn call_with_status(status: u16) -> ApiCall {
        let mut call = ApiCall::new("test");
        call.status = Some(status);
        call
    }

    #[test]
    fn test_status_number_and_array() {
        let mut env = Environment::new();
        let mut call = call_with_status(201);

        assert!(check(&StatusAssertion, json!({"status": 201}), &mut call, &mut env).is_ok());
        assert!(
            check(&StatusAssertion, json!({"status": [200, 201]}), &mut call, &mut env).is_ok()
        );
        assert!(matches!(
            check(&StatusAssertion, json!({"status": 200}), &mut call, &mut env),
            Err(CheckError::Failed(_))
        ));
    }

    #[test]
    fn test_status_pattern() {
        let mut env = Environment::new();
        let mut call = call_with_status(404);

        assert!(check(&StatusAssertion, json!({"status": "4.."}), &mut call, &mut env).is_ok());
        assert!(matches!(
            check(&StatusAssertion, json!({"status": null}), &mut call, &mut env),
            Err(CheckError::Failed(_))
        ));
        assert!(matches!(
            check(&StatusAssertion, json!({"status": true}), &mut call, &mut env),
            Err(CheckError::Error(_))
        ));
    }

    #[test]
    fn test_headers_assertion() {
        let mut env = Environment::new();
        let mut call = call_with_status(200);
        call.response_headers
            .add("Content-Type", "application/json; charset=utf-8");

        assert!(
            check(
                &HeadersAssertion,
                json!({"headers": {"content-type": "application/json.*"}}),
                &mut call,
                &mut env
            )
            .is_ok()
        );
        assert!(matches!(
            check(
                &HeadersAssertion,
                json!({"header": {"Content-Type": "text/.*"}}),
                &mut call,
                &mut env
            ),
            Err(CheckError::Failed(_))
        ));
        assert!(matches!(
            check(
                &HeadersAssertion,
                json!({"headers": {"Location": ".*"}}),
                &mut call,
                &mut env
            ),
            Err(CheckError::Failed(_))
        ));
        assert!(matches!(
            check(
                &HeadersAssertion,
                json!({"headers": {"Content-Type": "(unclosed"}}),
                &mut call,
                &mut env
            ),
            Err(CheckError::Error(_))
        ));
    }

    #[test]
    fn test_expr_assertion() {
        let mut env = Environment::new();
        env.bind("count", 2i64);
        let mut call = ApiCall::new("test");

        assert!(check(&ExprAssertion, json!({"expr": "count == 2"}), &mut call, &mut env).is_ok());
        assert!(matches!(
            check(&ExprAssertion, json!({"expr": "count > 2"}), &mut call, &mut env),
            Err(CheckError::Failed(_))
        ));
        assert!(matches!(
            check(&ExprAssertion, json!({"expr": "count"}), &mut call, &mut env),
            Err(CheckError::Error(_))
        ));
    }

    #[test]
    fn test_bound_assertion() {
        let mut env = Environment::new();
        env.bind("token", "abc");
        let mut call = ApiCall::new("test");

        assert!(check(&BoundAssertion, json!({"bound": "token"}), &mut call, &mut env).is_ok());
        assert!(matches!(
            check(&BoundAssertion, json!({"bound": ["token", "other"]}), &mut call, &mut env),
            Err(CheckError::Failed(_))
        ));
    }

    #[test]
    fn test_equal_assertion() {
        let mut env = Environment::new();
        env.bind("id", 42i64);
        env.bind("user", json!({"id": 42}));
        let mut call = ApiCall::new("test");

        assert!(check(&EqualAssertion, json!({"equal": ["{id}", 42]}), &mut call, &mut env).is_ok());
        assert!(
            check(&EqualAssertion, json!({"equal": ["{@user@}", {"id": 42}]}), &mut call, &mut env)
                .is_ok()
        );
        assert!(matches!(
            check(&EqualAssertion, json!({"equal": ["{id}", "43"]}), &mut call, &mut env),
            Err(CheckError::Failed(_))
        ));
        assert!(matches!(
            check(&EqualAssertion, json!({"equal": [1]}), &mut call, &mut env),
            Err(CheckError::Error(_))
        ));
    }
}
