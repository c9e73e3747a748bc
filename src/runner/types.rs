use serde_json::Value;
use std::fmt;
use std::time::Duration;

use crate::runner::call::ApiCall;

/// 一条断言的执行记录
#[derive(Debug, Clone, PartialEq)]
pub struct AssertionRecord {
    /// 选择插件的关键字，例如 `status`、`expr`
    pub keyword: String,

    /// 断言指令原文
    pub directive: Value,

    /// 失败原因
    pub message: Option<String>,
}

impl AssertionRecord {
    pub fn new(keyword: impl Into<String>, directive: Value) -> Self {
        Self {
            keyword: keyword.into(),
            directive,
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl fmt::Display for AssertionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.directive {
            Value::Object(map) if map.len() == 1 && map.contains_key("expr") => {
                match &map["expr"] {
                    Value::String(expr) => write!(f, "{}", expr),
                    other => write!(f, "{}", other),
                }
            }
            other => write!(f, "{}", other),
        }
    }
}

/// 整次运行的统计
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    /// 执行过的脚本数（包括条件不满足而跳过的脚本）
    pub scripts: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    /// 出现硬错误的脚本数
    pub errors: usize,
    /// 被取消的脚本数
    pub canceled: usize,
    pub total_duration: Duration,
}

impl RunSummary {
    pub fn from_calls(calls: &[ApiCall]) -> Self {
        Self {
            scripts: calls.len(),
            passed: calls.iter().map(|c| c.passed.len()).sum(),
            failed: calls.iter().map(|c| c.failed.len()).sum(),
            skipped: calls.iter().map(|c| c.skipped.len()).sum(),
            errors: calls.iter().filter(|c| c.error.is_some()).count(),
            canceled: calls.iter().filter(|c| c.canceled).count(),
            total_duration: calls.iter().filter_map(|c| c.elapsed).sum(),
        }
    }

    /// 没有失败的断言也没有硬错误
    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.errors == 0
    }

    pub fn exit_code(&self) -> i32 {
        if self.is_success() { 0 } else { 1 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_summary_counts() {
        let mut first = ApiCall::new("first");
        first.passed.push(AssertionRecord::new("status", json!({"status": 200})));
        first.elapsed = Some(Duration::from_millis(100));

        let mut second = ApiCall::new("second");
        second
            .failed
            .push(AssertionRecord::new("expr", json!({"expr": "x == 1"})).with_message("false"));
        second
            .skipped
            .push(AssertionRecord::new("expr", json!({"expr": "y == 2"})));
        second.elapsed = Some(Duration::from_millis(200));

        let summary = RunSummary::from_calls(&[first, second]);
        assert_eq!(summary.scripts, 2);
        assert_eq!(summary.passed, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.total_duration, Duration::from_millis(300));
        assert!(!summary.is_success());
        assert_eq!(summary.exit_code(), 1);
    }

    #[test]
    fn test_hard_error_fails_run() {
        let mut call = ApiCall::new("broken");
        call.error = Some("boom".to_string());

        let summary = RunSummary::from_calls(&[call]);
        assert_eq!(summary.errors, 1);
        assert_eq!(summary.exit_code(), 1);
        assert!(RunSummary::from_calls(&[]).is_success());
    }

    #[test]
    fn test_record_display() {
        let record = AssertionRecord::new("expr", json!({"expr": "count > 0"}));
        assert_eq!(record.to_string(), "count > 0");

        let record = AssertionRecord::new("status", json!({"status": 201}));
        assert_eq!(record.to_string(), r#"{"status":201}"#);
    }
}
