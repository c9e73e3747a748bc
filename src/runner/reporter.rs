use colored::Colorize;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, Color, Table};

use crate::runner::call::ApiCall;
use crate::runner::types::RunSummary;
use crate::utils::{ResponseFormat, ResponseFormatter};

pub struct RunReporter {
    verbose: bool,
    formatter: ResponseFormatter,
}

impl RunReporter {
    pub fn new(verbose: bool) -> Self {
        let format = if verbose {
            ResponseFormat::Verbose
        } else {
            ResponseFormat::Compact
        };

        Self {
            verbose,
            formatter: ResponseFormatter::new(format),
        }
    }

    /// 打印单个脚本的执行结果
    pub fn print_call(&self, index: usize, call: &ApiCall) {
        let request = match (&call.method, &call.uri) {
            (Some(method), Some(uri)) => format!("{} {}", method.to_string().cyan(), uri),
            _ => String::new(),
        };

        // 条件不满足或已取消
        if call.condition_skipped || call.canceled {
            let reason = if call.canceled { "(canceled)" } else { "(skipped)" };
            println!(
                " {} [{}] {} {} {}",
                "⊘".dimmed(),
                index,
                call.script,
                request,
                reason.dimmed()
            );
            return;
        }

        let success = call.is_success();
        let symbol = if success { "✓".green() } else { "✗".red() };
        let timing = call
            .elapsed
            .map(|d| format!(" ({}ms)", d.as_millis()))
            .unwrap_or_default();
        println!(" {} [{}] {} {}{}", symbol, index, call.script, request, timing);

        // verbose 模式或失败时显示响应
        if self.verbose || !success {
            let formatted = self.formatter.format(call);
            if !formatted.is_empty() {
                for line in formatted.lines() {
                    println!("   {}", line);
                }
                println!();
            }
        }

        if let Some(error) = &call.error {
            println!("   {}: {}", "Error".red().bold(), error);
            println!();
        }

        if self.verbose {
            for record in &call.passed {
                println!("     {} {}", "✓".green(), record);
            }
        }
        for record in &call.failed {
            println!("     {} {}", "✗".red(), record);
            if let Some(message) = &record.message {
                println!("       {}", message.red());
            }
        }
        for record in &call.skipped {
            println!("     {} {}", "⊘".dimmed(), record.to_string().dimmed());
        }
    }

    pub fn print_calls(&self, calls: &[ApiCall]) {
        for (index, call) in calls.iter().enumerate() {
            self.print_call(index + 1, call);
        }
    }

    /// 每个脚本一行的汇总表
    pub fn summary_table(&self, calls: &[ApiCall]) -> Table {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL).set_header(vec![
            "Script", "Method", "URI", "Status", "Time", "Passed", "Failed", "Skipped",
        ]);

        for call in calls {
            let status_cell = match call.status {
                Some(code) if code < 400 => Cell::new(code).fg(Color::Green),
                Some(code) => Cell::new(code).fg(Color::Red),
                None if call.error.is_some() => Cell::new("error").fg(Color::Red),
                None => Cell::new("-").add_attribute(Attribute::Dim),
            };
            let failed_cell = if call.failed.is_empty() {
                Cell::new(0)
            } else {
                Cell::new(call.failed.len()).fg(Color::Red)
            };

            table.add_row(vec![
                Cell::new(&call.script),
                Cell::new(call.method.map(|m| m.to_string()).unwrap_or_default()),
                Cell::new(call.uri.as_deref().unwrap_or("")).add_attribute(Attribute::Dim),
                status_cell,
                Cell::new(
                    call.elapsed
                        .map(|d| format!("{}ms", d.as_millis()))
                        .unwrap_or_default(),
                ),
                Cell::new(call.passed.len()).fg(Color::Green),
                failed_cell,
                Cell::new(call.skipped.len()),
            ]);
        }
        table
    }

    /// 打印汇总
    pub fn print_summary(&self, calls: &[ApiCall], summary: &RunSummary) {
        if !calls.is_empty() {
            println!("\n{}", self.summary_table(calls));
        }

        println!("\n{}", "━".repeat(50));
        println!("{}", "Summary".bold());
        println!("{}", "━".repeat(50));

        println!(
            "  {}: {} run, {} errors, {} canceled",
            "Scripts".bold(),
            summary.scripts,
            if summary.errors > 0 {
                summary.errors.to_string().red()
            } else {
                summary.errors.to_string().normal()
            },
            summary.canceled
        );
        println!(
            "  {}: {} passed, {} failed, {} skipped",
            "Assertions".bold(),
            summary.passed.to_string().green(),
            if summary.failed > 0 {
                summary.failed.to_string().red()
            } else {
                summary.failed.to_string().normal()
            },
            summary.skipped.to_string().dimmed()
        );
        println!(
            "  {}: {:.3}s",
            "Duration".bold(),
            summary.total_duration.as_secs_f64()
        );
        println!();
    }
}

impl Default for RunReporter {
    fn default() -> Self {
        Self::new(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Method;
    use crate::runner::types::AssertionRecord;
    use serde_json::json;

    #[test]
    fn test_summary_table_has_row_per_call() {
        let mut ok = ApiCall::new("ok");
        ok.method = Some(Method::Get);
        ok.uri = Some("http://localhost/items".to_string());
        ok.status = Some(200);
        ok.passed.push(AssertionRecord::new("status", json!({"status": 200})));

        let mut broken = ApiCall::new("broken");
        broken.error = Some("boom".to_string());

        let reporter = RunReporter::default();
        let rendered = reporter.summary_table(&[ok, broken]).to_string();

        assert!(rendered.contains("Script"));
        assert!(rendered.contains("http://localhost/items"));
        assert!(rendered.contains("broken"));
        assert!(rendered.contains("error"));
    }
}
