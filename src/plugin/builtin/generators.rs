use serde_json::{Map, Value};

use crate::plugin::traits::{BodyGenerator, CallContext, first_field};
use crate::script::Script;
use crate::utils::redirect_target;
use crate::variable::{Binding, VariableResolver};
use crate::{RavelError, Result};

/// `{"json": ...}`，未指定生成器时的默认值
///
/// - 字符串：`@file` 读取 JSON 文件；变量名指向 JSON 绑定时使用该值；否则按 JSON 文本解析
/// - 对象或数组：递归展开，`{@name@}` 替换为绑定值
pub struct JsonBody;

impl JsonBody {
    fn resolve(value: &Value, call: &mut CallContext<'_>) -> Result<Value> {
        match value {
            Value::String(raw) => {
                if let Some(Binding::Json(bound)) = call.env.get(raw) {
                    return Ok(VariableResolver::substitute_json(bound, call.env));
                }

                let text = call.expand(raw);
                let json: Value = match redirect_target(&text) {
                    Some(location) => {
                        let content = call.reader.read_text(location)?;
                        serde_json::from_str(&content).map_err(|e| {
                            RavelError::ScriptError(format!(
                                "{} does not contain valid JSON: {}",
                                location, e
                            ))
                        })?
                    }
                    None => serde_json::from_str(&text).map_err(|e| {
                        RavelError::ScriptError(format!("json body is not valid JSON: {}", e))
                    })?,
                };
                Ok(VariableResolver::substitute_json(&json, call.env))
            }
            other => Ok(VariableResolver::substitute_json(other, call.env)),
        }
    }
}

impl BodyGenerator for JsonBody {
    fn generate(
        &self,
        _script: &Script,
        directive: &Map<String, Value>,
        call: &mut CallContext<'_>,
    ) -> Result<Vec<u8>> {
        let value = first_field(directive).map(|(_, v)| v).unwrap_or(&Value::Null);
        let json = Self::resolve(value, call)?;
        Ok(serde_json::to_vec(&json)?)
    }
}

fn body_items(value: &Value, keyword: &str) -> Result<Vec<String>> {
    match value {
        Value::String(s) => Ok(vec![s.clone()]),
        Value::Array(items) => items
            .iter()
            .map(|item| {
                item.as_str().map(str::to_string).ok_or_else(|| {
                    RavelError::ScriptError(format!(
                        "{} body items must be strings; found {}",
                        keyword, item
                    ))
                })
            })
            .collect(),
        other => Err(RavelError::ScriptError(format!(
            "{} body must be a string or array of strings; found {}",
            keyword, other
        ))),
    }
}

/// `{"text": "line"}` 或 `{"text": ["line 1", "@file.txt"]}`，各项以换行连接
pub struct TextBody;

impl BodyGenerator for TextBody {
    fn generate(
        &self,
        _script: &Script,
        directive: &Map<String, Value>,
        call: &mut CallContext<'_>,
    ) -> Result<Vec<u8>> {
        let Some((keyword, value)) = first_field(directive) else {
            return Ok(Vec::new());
        };

        let mut lines = Vec::new();
        for item in body_items(value, keyword)? {
            let text = call.expand(&item);
            match redirect_target(&text) {
                Some(location) => lines.push(call.reader.read_text(location)?),
                None => lines.push(text),
            }
        }
        Ok(lines.join("\n").into_bytes())
    }
}

/// `{"binary": "@image.png"}` 或文件数组，按顺序拼接字节
pub struct BinaryBody;

impl BodyGenerator for BinaryBody {
    fn generate(
        &self,
        _script: &Script,
        directive: &Map<String, Value>,
        call: &mut CallContext<'_>,
    ) -> Result<Vec<u8>> {
        let Some((keyword, value)) = first_field(directive) else {
            return Ok(Vec::new());
        };

        let mut bytes = Vec::new();
        for item in body_items(value, keyword)? {
            let text = call.expand(&item);
            let location = redirect_target(&text).ok_or_else(|| {
                RavelError::ScriptError(format!(
                    "binary body items must name a file with @; found {}",
                    text
                ))
            })?;
            bytes.extend(call.reader.read_bytes(location)?);
        }
        Ok(bytes)
    }
}
