use serde_json::{Map, Value};

use crate::plugin::builtin::EXPR_KEYWORD;
use crate::plugin::{CallContext, CheckError, PluginKind, PluginRegistry, Stage};
use crate::runner::cancel::CancelToken;
use crate::runner::types::AssertionRecord;
use crate::script::ScriptChain;
use crate::{RavelError, Result};

/// 一个断言阶段的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageOutcome {
    /// 全部断言通过（或没有断言）
    Completed,
    /// 某条断言失败，后续断言已标记为跳过
    Failed,
    Canceled,
}

/// 断言字段统一为数组：字符串或对象包装为单元素数组
pub(crate) fn normalize(value: &Value, stage: Stage) -> Result<Vec<Value>> {
    match value {
        Value::Array(items) => Ok(items.clone()),
        Value::String(_) | Value::Object(_) => Ok(vec![value.clone()]),
        other => Err(RavelError::ScriptError(format!(
            "{} must be a string, object or array; found {}",
            stage, other
        ))),
    }
}

/// 字符串断言视为 `{"expr": ...}`
fn directive_of(item: &Value, stage: Stage) -> Result<Map<String, Value>> {
    match item {
        Value::String(expr) => {
            let mut map = Map::new();
            map.insert(EXPR_KEYWORD.to_string(), Value::String(expr.clone()));
            Ok(map)
        }
        Value::Object(map) if !map.is_empty() => Ok(map.clone()),
        other => Err(RavelError::ScriptError(format!(
            "{} item must be a string or non-empty object; found {}",
            stage, other
        ))),
    }
}

fn record_of(item: &Value) -> AssertionRecord {
    match item {
        Value::String(expr) => {
            let mut map = Map::new();
            map.insert(EXPR_KEYWORD.to_string(), Value::String(expr.clone()));
            AssertionRecord::new(EXPR_KEYWORD, Value::Object(map))
        }
        Value::Object(map) => AssertionRecord::new(
            map.keys().next().cloned().unwrap_or_default(),
            item.clone(),
        ),
        other => AssertionRecord::new("", other.clone()),
    }
}

/// 依次执行链上的 `preconditions` 或 `assert`，从最外层模板开始
///
/// 第一条失败的断言终止整个阶段，同一数组中剩余的断言记为跳过。
pub fn run_stage(
    chain: &ScriptChain<'_>,
    stage: Stage,
    plugins: &PluginRegistry,
    cancel: &CancelToken,
    ctx: &mut CallContext<'_>,
) -> Result<StageOutcome> {
    for link in chain.outermost_first() {
        let Some(value) = link.field(stage.key()) else {
            continue;
        };
        let items = normalize(value, stage)?;

        for (index, item) in items.iter().enumerate() {
            if cancel.is_canceled() {
                return Ok(StageOutcome::Canceled);
            }

            let directive = directive_of(item, stage)?;
            let keyword = directive.keys().next().cloned().unwrap_or_default();
            let assertion =
                plugins
                    .assertion(&keyword)
                    .ok_or_else(|| RavelError::UnknownPlugin {
                        kind: PluginKind::Assertion,
                        keyword: keyword.clone(),
                    })?;

            let record = AssertionRecord::new(keyword.as_str(), Value::Object(directive.clone()));
            match assertion.check(chain.script(), &directive, stage, ctx) {
                Ok(()) => {
                    tracing::debug!("{} {} passed: {}", link.name(), stage, record);
                    ctx.call.passed.push(record);
                }
                Err(CheckError::Failed(message)) => {
                    tracing::warn!("{} {} failed: {}: {}", link.name(), stage, record, message);
                    ctx.call.failed.push(record.with_message(message));
                    ctx.call
                        .skipped
                        .extend(items[index + 1..].iter().map(record_of));
                    return Ok(StageOutcome::Failed);
                }
                Err(CheckError::Error(error)) => return Err(error),
            }

            if cancel.is_canceled() {
                return Ok(StageOutcome::Canceled);
            }
        }
    }
    Ok(StageOutcome::Completed)
}
