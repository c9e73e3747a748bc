use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use serde_json::Value;

use crate::expr::{Evaluator, SimpleEvaluator};
use crate::http::{ReqwestTransport, Transport};
use crate::plugin::PluginRegistry;
use crate::runner::call::ApiCall;
use crate::runner::cancel::CancelToken;
use crate::runner::pipeline::Pipeline;
use crate::runner::types::RunSummary;
use crate::script::{Script, TemplateTable};
use crate::utils::{ContentReader, FsContentReader, redirect_target};
use crate::variable::{Binding, Environment, HttpSettings};
use crate::{RavelError, Result};

/// 未命名脚本的默认名称：加载时刻
fn timestamp_name() -> String {
    Local::now().format("%a %b %d %H:%M:%S %Y").to_string()
}

/// 脚本运行时
///
/// 持有共享环境、模板表、插件注册表和调用历史。同一进程中可以创建多个互不影响的
/// Runtime。
pub struct Runtime {
    scripts: HashMap<String, Script>,
    templates: TemplateTable,
    env: Environment,
    plugins: PluginRegistry,
    transport: Box<dyn Transport>,
    evaluator: Box<dyn Evaluator>,
    /// 未设置时使用 `FsContentReader`，相对路径按脚本所在文件的目录解析
    reader: Option<Box<dyn ContentReader>>,
    /// 从文件加载的脚本所在的目录
    script_dirs: HashMap<String, PathBuf>,
    cancel: CancelToken,
    calls: Vec<ApiCall>,
}

impl Runtime {
    /// 使用默认 HTTP 设置和全部内置插件创建运行时
    pub fn new() -> Result<Self> {
        Self::with_settings(&HttpSettings::default())
    }

    pub fn with_settings(settings: &HttpSettings) -> Result<Self> {
        Ok(Self::with_transport(Box::new(ReqwestTransport::new(settings)?)))
    }

    pub fn with_transport(transport: Box<dyn Transport>) -> Self {
        Self {
            scripts: HashMap::new(),
            templates: TemplateTable::new(),
            env: Environment::new(),
            plugins: PluginRegistry::with_builtins(),
            transport,
            evaluator: Box::new(SimpleEvaluator),
            reader: None,
            script_dirs: HashMap::new(),
            cancel: CancelToken::new(),
            calls: Vec::new(),
        }
    }

    pub fn with_evaluator(mut self, evaluator: Box<dyn Evaluator>) -> Self {
        self.evaluator = evaluator;
        self
    }

    pub fn with_reader(mut self, reader: Box<dyn ContentReader>) -> Self {
        self.reader = Some(reader);
        self
    }

    /// 与外部共享取消标志
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_env(mut self, env: Environment) -> Self {
        self.env = env;
        self
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    pub fn env_mut(&mut self) -> &mut Environment {
        &mut self.env
    }

    pub fn bind(&mut self, name: impl Into<String>, value: impl Into<Binding>) {
        self.env.bind(name, value);
    }

    pub fn plugins(&self) -> &PluginRegistry {
        &self.plugins
    }

    pub fn plugins_mut(&mut self) -> &mut PluginRegistry {
        &mut self.plugins
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_canceled(&self) -> bool {
        self.cancel.is_canceled()
    }

    pub fn template(&self, name: &str) -> Option<&Script> {
        self.templates.get(name)
    }

    pub fn script(&self, name: &str) -> Option<&Script> {
        self.scripts.get(name)
    }

    /// 调用历史，按执行顺序
    pub fn calls(&self) -> &[ApiCall] {
        &self.calls
    }

    /// 本次运行中失败的断言总数
    pub fn failed_assertion_count(&self) -> usize {
        self.calls.iter().map(|c| c.failed.len()).sum()
    }

    pub fn report(&self) -> RunSummary {
        RunSummary::from_calls(&self.calls)
    }

    pub fn exit_code(&self) -> i32 {
        self.report().exit_code()
    }

    /// 加载 JSON 文本中的脚本（单个对象或数组），返回加载的脚本
    pub fn load_str(&mut self, text: &str) -> Result<Vec<Script>> {
        let value: Value = serde_json::from_str(text)?;
        self.load_value(value, None)
    }

    /// 加载脚本文件；数组中的 `@file` 项相对该文件所在目录解析
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<Vec<Script>> {
        let path = path.as_ref();
        tracing::debug!("Loading scripts from {}", path.display());
        let text = fs::read_to_string(path)
            .map_err(|e| RavelError::ContentError(format!("{}: {}", path.display(), e)))?;
        let value: Value = serde_json::from_str(&text)?;
        self.load_value(value, path.parent().map(Path::to_path_buf))
    }

    /// 加载 JSON 值；`base_dir` 用于解析数组中的 `@file` 引用
    pub fn load_value(&mut self, value: Value, base_dir: Option<PathBuf>) -> Result<Vec<Script>> {
        match value {
            Value::Object(_) => Ok(vec![self.register(value, base_dir.as_deref())?]),
            Value::Array(items) => {
                let mut loaded = Vec::new();
                for item in items {
                    match item {
                        Value::Object(_) => {
                            loaded.push(self.register(item, base_dir.as_deref())?)
                        }
                        Value::String(text) => {
                            let Some(location) = redirect_target(&text) else {
                                return Err(RavelError::ScriptError(format!(
                                    "script array items must be objects or @file references; found \"{}\"",
                                    text
                                )));
                            };
                            let path = match &base_dir {
                                Some(dir) => dir.join(location),
                                None => PathBuf::from(location),
                            };
                            loaded.extend(self.load_file(path)?);
                        }
                        other => {
                            return Err(RavelError::ScriptError(format!(
                                "script array items must be objects or @file references; found {}",
                                other
                            )));
                        }
                    }
                }
                Ok(loaded)
            }
            other => Err(RavelError::ScriptError(format!(
                "a script document must be an object or array; found {}",
                other
            ))),
        }
    }

    /// 创建脚本并登记到模板表或脚本表
    fn register(&mut self, value: Value, base_dir: Option<&Path>) -> Result<Script> {
        let script = Script::from_value(value, &self.env, timestamp_name)?;

        match base_dir.filter(|d| !d.as_os_str().is_empty()) {
            Some(dir) => {
                self.script_dirs
                    .insert(script.name().to_string(), dir.to_path_buf());
            }
            None => {
                self.script_dirs.remove(script.name());
            }
        }

        if let Some(template) = script.template() {
            if !self.templates.contains_key(template) {
                return Err(RavelError::TemplateNotFound(template.to_string()));
            }
        }

        if script.is_template() {
            tracing::debug!("Loaded template {}", script.name());
            self.templates
                .insert(script.name().to_string(), script.clone());
        } else {
            tracing::debug!("Loaded script {}", script.name());
            self.scripts.insert(script.name().to_string(), script.clone());
        }
        Ok(script)
    }

    /// 加载并执行 JSON 文本中的全部脚本
    pub async fn execute_str(&mut self, text: &str) -> Result<()> {
        let scripts = self.load_str(text)?;
        self.execute_loaded(&scripts).await
    }

    pub async fn execute_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let scripts = self.load_file(path)?;
        self.execute_loaded(&scripts).await
    }

    pub async fn execute_value(&mut self, value: Value) -> Result<()> {
        let scripts = self.load_value(value, None)?;
        self.execute_loaded(&scripts).await
    }

    /// 按名称执行已加载的脚本
    pub async fn execute_script(&mut self, name: &str) -> Result<()> {
        let script = self
            .scripts
            .get(name)
            .cloned()
            .ok_or_else(|| RavelError::ScriptNotFound(name.to_string()))?;
        self.execute_loaded(std::slice::from_ref(&script)).await
    }

    /// 依次执行脚本，模板被忽略
    ///
    /// 断言失败不会中止运行；硬错误记录到对应的调用后立即返回。
    pub async fn execute_loaded(&mut self, scripts: &[Script]) -> Result<()> {
        for script in scripts.iter().filter(|s| s.is_runnable()) {
            let mut call = ApiCall::new(script.name());
            let prior_failures = self.failed_assertion_count();

            let default_reader;
            let reader: &dyn ContentReader = match &self.reader {
                Some(reader) => reader.as_ref(),
                None => {
                    default_reader = match self.script_dirs.get(script.name()) {
                        Some(dir) => FsContentReader::with_base_dir(dir),
                        None => FsContentReader::new(),
                    };
                    &default_reader
                }
            };

            let mut pipeline = Pipeline {
                templates: &self.templates,
                env: &mut self.env,
                plugins: &self.plugins,
                transport: self.transport.as_ref(),
                evaluator: self.evaluator.as_ref(),
                reader,
                cancel: &self.cancel,
                prior_failures,
            };
            let result = pipeline.run(script, &mut call).await;

            if let Err(error) = result {
                tracing::error!("{} failed: {}", script.name(), error);
                call.record_error(&error);
                self.calls.push(call);
                return Err(error);
            }
            self.calls.push(call);
        }
        Ok(())
    }
}
