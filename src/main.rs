mod cli;

use clap::Parser;
use cli::Cli;
use ravel::logger::{Verbosity, init_logger};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // 初始化日志系统
    init_logger(Verbosity::from_flags(cli.quiet, cli.verbose));

    match cli::run(cli).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(2);
        }
    }
}
