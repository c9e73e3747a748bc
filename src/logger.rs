use tracing_subscriber::{EnvFilter, fmt};

/// 命令行指定的日志详细程度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// -q / --quiet
    Quiet,
    #[default]
    Normal,
    /// -v / --verbose
    Verbose,
}

impl Verbosity {
    pub fn from_flags(quiet: bool, verbose: bool) -> Self {
        match (quiet, verbose) {
            (true, _) => Verbosity::Quiet,
            (_, true) => Verbosity::Verbose,
            _ => Verbosity::Normal,
        }
    }

    /// 对应的默认过滤级别
    pub fn default_directive(&self) -> &'static str {
        match self {
            Verbosity::Quiet => "warn",
            Verbosity::Normal => "info",
            Verbosity::Verbose => "trace",
        }
    }
}

/// 初始化日志系统
///
/// RUST_LOG 环境变量优先，否则由 -q / -v 决定级别
/// 默认级别: info
///
/// 示例:
/// - RUST_LOG=debug ravel script.json
/// - ravel -v script.json
pub fn init_logger(verbosity: Verbosity) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.default_directive()));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    tracing::debug!("Logger initialized");
}
