use crate::error::{RavelError, Result};
use crate::variable::resolver::VariableResolver;
use crate::variable::types::Environment;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// 单个环境的变量表
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Profile {
    /// 变量映射
    #[serde(flatten)]
    pub variables: HashMap<String, String>,
}

/// HTTP 传输设置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    /// 单次调用超时（秒）
    pub timeout_secs: u64,
    /// 是否跟随重定向（仅对 GET/HEAD 生效）
    pub follow_redirects: bool,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            follow_redirects: true,
        }
    }
}

impl HttpSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// 完整的配置文件 ravel.toml
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RavelConfig {
    #[serde(default)]
    pub http: HttpSettings,

    /// 所有环境配置
    #[serde(default)]
    pub environments: HashMap<String, Profile>,
}

impl RavelConfig {
    /// 获取指定环境的变量
    pub fn get_environment(&self, env_name: &str) -> Option<&Profile> {
        self.environments.get(env_name)
    }
}

/// 配置文件加载器
pub struct ConfigLoader;

impl ConfigLoader {
    /// 配置文件名
    pub const CONFIG_FILE: &'static str = "ravel.toml";

    /// 从指定路径加载配置文件
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<RavelConfig> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            RavelError::ConfigError(format!("Failed to read {}: {}", path.display(), e))
        })?;

        toml::from_str(&content).map_err(|e| {
            RavelError::ConfigError(format!("Failed to parse {}: {}", path.display(), e))
        })
    }

    /// 查找并加载配置文件
    /// 查找顺序：
    /// 1. 当前目录及父目录
    /// 2. 用户配置目录 ~/.config/ravel/
    pub fn find_and_load() -> Option<RavelConfig> {
        Self::try_load_from_current_dir().or_else(Self::try_load_from_user_dir)
    }

    /// 尝试从当前目录及其父目录加载
    fn try_load_from_current_dir() -> Option<RavelConfig> {
        let mut current = std::env::current_dir().ok()?;

        loop {
            let config_path = current.join(Self::CONFIG_FILE);
            if config_path.exists() {
                return Self::load_or_warn(&config_path);
            }

            if !current.pop() {
                break;
            }
        }

        None
    }

    /// 尝试从用户配置目录加载
    fn try_load_from_user_dir() -> Option<RavelConfig> {
        let home = dirs::home_dir()?;
        let config_path = home.join(".config").join("ravel").join(Self::CONFIG_FILE);

        if config_path.exists() {
            Self::load_or_warn(&config_path)
        } else {
            None
        }
    }

    fn load_or_warn(path: &Path) -> Option<RavelConfig> {
        match Self::load_from_path(path) {
            Ok(config) => {
                tracing::debug!("Loaded config from {}", path.display());
                Some(config)
            }
            Err(e) => {
                tracing::warn!("Ignoring config: {}", e);
                None
            }
        }
    }

    /// 构建初始变量环境
    /// env_name: 环境名称（如 "dev", "prod"）
    /// cli_vars: CLI 传入的变量覆盖（--var key=value）
    pub fn build_environment(
        config: &RavelConfig,
        env_name: Option<&str>,
        cli_vars: &[(String, String)],
    ) -> Result<Environment> {
        let mut env = Environment::new();

        // 1. 从配置文件加载环境变量
        if let Some(name) = env_name {
            let profile = config.get_environment(name).ok_or_else(|| {
                RavelError::ConfigError(format!("Unknown environment '{}'", name))
            })?;
            env.extend_strings(profile.variables.iter().map(|(key, value)| {
                // 解析系统环境变量 ${VAR}
                (key.clone(), VariableResolver::resolve_env_vars(value))
            }));
        }

        // 2. 应用 CLI 覆盖（优先级最高）
        env.extend_strings(cli_vars.iter().cloned());

        Ok(env)
    }

    /// 解析 CLI 变量参数 "key=value"
    pub fn parse_cli_var(s: &str) -> Option<(String, String)> {
        s.split_once('=')
            .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
            .filter(|(k, _)| !k.is_empty())
    }
}
