use colored::*;

use crate::http::Status;
use crate::runner::ApiCall;

const AUTHORIZATION_MASK: &str = "************";

pub enum ResponseFormat {
    Compact,
    Verbose,
}

/// 在终端中显示 [`ApiCall`] 的响应部分
pub struct ResponseFormatter {
    format: ResponseFormat,
    color: bool,
    show_body: bool,
    show_headers: bool,
    show_timing: bool,
}

impl ResponseFormatter {
    pub fn new(format: ResponseFormat) -> Self {
        Self {
            format,
            color: true,
            show_body: true,
            show_headers: true,
            show_timing: true,
        }
    }

    pub fn without_color(mut self) -> Self {
        self.color = false;
        self
    }

    pub fn format(&self, call: &ApiCall) -> String {
        let Some(code) = call.status else {
            return String::new();
        };

        let mut output = Vec::new();
        output.push(self.status_line(code));

        if self.show_timing {
            if let Some(elapsed) = call.elapsed {
                let timing = format!("Time: {}ms", elapsed.as_millis());
                output.push(self.paint(timing, |s| s.cyan()));
            }
        }

        match self.format {
            ResponseFormat::Compact => {
                if self.show_body && !call.response_body.is_empty() {
                    if call.response_body.len() < 200 && is_textual_body(call) {
                        output.push(pretty_body(&call.response_text()));
                    } else {
                        output.push(format!("Body: {} bytes", call.response_body.len()));
                    }
                }
            }
            ResponseFormat::Verbose => {
                if self.show_headers && !call.response_headers.is_empty() {
                    output.push(String::new());
                    output.push(self.paint("Headers:".to_string(), |s| s.blue().bold()));
                    for (name, value) in call.response_headers.iter() {
                        output.push(self.paint(format!("   {}: {}", name, value), |s| s.blue()));
                    }
                }
                if self.show_body && !call.response_body.is_empty() {
                    output.push(String::new());
                    output.push(self.paint("Body:".to_string(), |s| s.blue().bold()));
                    if is_textual_body(call) {
                        output.push(pretty_body(&call.response_text()));
                    } else {
                        output.push(format!("{} bytes", call.response_body.len()));
                    }
                }
            }
        }

        output.join("\n")
    }

    fn status_line(&self, code: u16) -> String {
        let reason = Status::new(code).map(|s| s.reason_phrase()).unwrap_or("");
        let line = format!("HTTP {} {}", code, reason).trim_end().to_string();
        if !self.color {
            return line;
        }
        let colored = if (200..300).contains(&code) {
            line.green()
        } else if (400..500).contains(&code) {
            line.yellow()
        } else {
            line.red()
        };
        match self.format {
            ResponseFormat::Compact => colored.to_string(),
            ResponseFormat::Verbose => colored.bold().to_string(),
        }
    }

    fn paint(&self, text: String, style: impl Fn(&str) -> ColoredString) -> String {
        if self.color {
            style(&text).to_string()
        } else {
            text
        }
    }
}

/// 可以按文本打印的 Content-Type
pub fn is_textual(content_type: &str) -> bool {
    let content_type = content_type.to_ascii_lowercase();
    content_type.starts_with("text/")
        || content_type.contains("json")
        || content_type.contains("xml")
        || content_type.contains("javascript")
        || content_type.contains("x-www-form-urlencoded")
}

fn is_textual_body(call: &ApiCall) -> bool {
    if call.response_headers.contains("content-type") {
        call.response_headers.content_type_matches(is_textual)
    } else {
        std::str::from_utf8(&call.response_body).is_ok()
    }
}

/// 格式化 JSON 文本，其他内容原样返回
pub fn pretty_body(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .and_then(|value| serde_json::to_string_pretty(&value))
        .unwrap_or_else(|_| body.to_string())
}

/// 日志中显示的头取值，Authorization 被遮盖
pub fn loggable_header_value<'a>(name: &str, value: &'a str) -> &'a str {
    if name.eq_ignore_ascii_case("authorization") {
        AUTHORIZATION_MASK
    } else {
        value
    }
}
