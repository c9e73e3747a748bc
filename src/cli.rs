use std::path::PathBuf;

use anyhow::{Context, anyhow};
use clap::Parser;

use ravel::Runtime;
use ravel::runner::RunReporter;
use ravel::variable::{ConfigLoader, RavelConfig};

pub type Result<T> = std::result::Result<T, anyhow::Error>;

/// 脚本文件无法加载时的退出码，与断言失败相同
const EXIT_FAILURE: i32 = 1;

#[derive(Parser)]
#[command(author, version, about = "Run JSON API test scripts", long_about = None)]
pub struct Cli {
    /// 脚本文件，按顺序执行并共享同一个环境
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// 只输出警告和错误
    #[arg(short, long)]
    pub quiet: bool,

    /// 输出完整的请求、响应和断言
    #[arg(short, long)]
    pub verbose: bool,

    /// 使用 ravel.toml 中的环境
    #[arg(short, long = "env")]
    pub env: Option<String>,

    /// 额外的变量，格式 name=value，可重复
    #[arg(long = "var", value_name = "NAME=VALUE", value_parser = parse_var)]
    pub vars: Vec<(String, String)>,

    /// 配置文件路径，默认在当前目录及上级目录中查找 ravel.toml
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

fn parse_var(s: &str) -> std::result::Result<(String, String), String> {
    ConfigLoader::parse_cli_var(s).ok_or_else(|| format!("expected NAME=VALUE, found '{}'", s))
}

fn load_config(cli: &Cli) -> Result<RavelConfig> {
    match &cli.config {
        Some(path) => ConfigLoader::load_from_path(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => Ok(ConfigLoader::find_and_load().unwrap_or_default()),
    }
}

/// 执行命令行指定的脚本，返回进程退出码
pub async fn run(cli: Cli) -> Result<i32> {
    let config = load_config(&cli)?;
    let env = ConfigLoader::build_environment(&config, cli.env.as_deref(), &cli.vars)?;

    let mut runtime = Runtime::with_settings(&config.http)?.with_env(env);

    let token = runtime.cancel_token();
    ctrlc::set_handler(move || {
        tracing::warn!("Interrupted; canceling remaining scripts");
        token.cancel();
    })
    .map_err(|e| anyhow!("failed to install Ctrl-C handler: {}", e))?;

    let reporter = RunReporter::new(cli.verbose);
    let mut failed_run = false;

    for file in &cli.files {
        if runtime.is_canceled() {
            break;
        }
        println!("\nRunning {}...\n", file.display());

        let first = runtime.calls().len();
        let result = runtime.execute_file(file).await;
        for (offset, call) in runtime.calls()[first..].iter().enumerate() {
            reporter.print_call(first + offset + 1, call);
        }

        if let Err(e) = result {
            eprintln!("{}: {}", file.display(), e);
            failed_run = true;
            break;
        }
    }

    let summary = runtime.report();
    reporter.print_summary(runtime.calls(), &summary);

    if failed_run {
        Ok(EXIT_FAILURE)
    } else {
        Ok(summary.exit_code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_arguments() {
        let cli = Cli::try_parse_from([
            "ravel", "-v", "-e", "dev", "--var", "token=abc", "--var", "id=7", "a.json", "b.json",
        ])
        .unwrap();

        assert!(cli.verbose);
        assert!(!cli.quiet);
        assert_eq!(cli.env.as_deref(), Some("dev"));
        assert_eq!(
            cli.vars,
            vec![
                ("token".to_string(), "abc".to_string()),
                ("id".to_string(), "7".to_string())
            ]
        );
        assert_eq!(cli.files, vec![PathBuf::from("a.json"), PathBuf::from("b.json")]);
    }

    #[test]
    fn test_rejects_bad_var_and_missing_files() {
        assert!(Cli::try_parse_from(["ravel", "--var", "novalue", "a.json"]).is_err());
        assert!(Cli::try_parse_from(["ravel", "-q"]).is_err());
    }
}
