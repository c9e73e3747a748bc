use serde_json::{Map, Value};

use crate::plugin::builtin::assertions::full_match;
use crate::plugin::traits::{CallContext, Extractor, first_field};
use crate::script::Script;
use crate::variable::Binding;
use crate::{RavelError, Result};

fn variable_name<'a>(keyword: &str, value: &'a Value) -> Result<&'a str> {
    value.as_str().ok_or_else(|| {
        RavelError::ScriptError(format!(
            "{} extractor requires a variable name; found {}",
            keyword, value
        ))
    })
}

/// `{"json": "user"}`：把响应体解析为 JSON 并绑定
pub struct JsonExtractor;

impl Extractor for JsonExtractor {
    fn extract(
        &self,
        _script: &Script,
        directive: &Map<String, Value>,
        call: &mut CallContext<'_>,
    ) -> Result<()> {
        let Some((keyword, value)) = first_field(directive) else {
            return Ok(());
        };
        let name = variable_name(keyword, value)?;

        let json: Value = serde_json::from_slice(&call.call.response_body).map_err(|e| {
            RavelError::ScriptError(format!("response body is not valid JSON: {}", e))
        })?;
        tracing::debug!("Bind {} to response JSON", name);
        call.env.bind(name, Binding::Json(json));
        Ok(())
    }
}

/// `{"text": "body"}`：把响应体作为文本绑定
pub struct TextExtractor;

impl Extractor for TextExtractor {
    fn extract(
        &self,
        _script: &Script,
        directive: &Map<String, Value>,
        call: &mut CallContext<'_>,
    ) -> Result<()> {
        let Some((keyword, value)) = first_field(directive) else {
            return Ok(());
        };
        let name = variable_name(keyword, value)?;
        let text = call.call.response_text().into_owned();
        tracing::debug!("Bind {} to response text ({} bytes)", name, text.len());
        call.env.bind(name, Binding::String(text));
        Ok(())
    }
}

/// `{"headers": {"location": "Location"}}`：按头名绑定第一个取值
pub struct HeadersExtractor;

impl Extractor for HeadersExtractor {
    fn extract(
        &self,
        _script: &Script,
        directive: &Map<String, Value>,
        call: &mut CallContext<'_>,
    ) -> Result<()> {
        let Some((keyword, Value::Object(spec))) = first_field(directive) else {
            return Err(RavelError::ScriptError(
                "headers extractor requires an object of variable to header names".to_string(),
            ));
        };

        for (name, header) in spec {
            let header = variable_name(keyword, header)?;
            match call.call.response_headers.get(header) {
                Some(value) => {
                    let value = value.to_string();
                    tracing::debug!("Bind {} to header {}", name, header);
                    call.env.bind(name.as_str(), Binding::String(value));
                }
                None => tracing::warn!("Header {} not found; {} is not bound", header, name),
            }
        }
        Ok(())
    }
}

/// `{"pattern": ["{location}", "^.*/(\\d+)$", "id"]}`
///
/// 第一项展开后与正则整串匹配，各捕获组依次绑定到后续变量名。
pub struct PatternExtractor;

impl Extractor for PatternExtractor {
    fn extract(
        &self,
        _script: &Script,
        directive: &Map<String, Value>,
        call: &mut CallContext<'_>,
    ) -> Result<()> {
        let items = match first_field(directive) {
            Some((_, Value::Array(items))) if items.len() >= 2 => items,
            _ => {
                return Err(RavelError::ScriptError(
                    "pattern extractor requires [string, regex, var, ...]".to_string(),
                ));
            }
        };

        let strings: Vec<&str> = items
            .iter()
            .map(|item| variable_name("pattern", item))
            .collect::<Result<_>>()?;

        let text = call.expand(strings[0]);
        let re = full_match(strings[1])?;
        let captures = re.captures(&text).ok_or_else(|| {
            RavelError::ScriptError(format!(
                "string '{}' does not match pattern {}",
                text, strings[1]
            ))
        })?;

        for (index, name) in strings[2..].iter().enumerate() {
            match captures.get(index + 1) {
                Some(group) => call.env.bind(*name, group.as_str()),
                None => tracing::warn!("Pattern group {} did not participate in the match", index + 1),
            }
        }
        Ok(())
    }
}
