use serde_json::{Map, Value, json};

use crate::expr::Evaluator;
use crate::http::{Request, Transport};
use crate::plugin::builtin::DEFAULT_BODY_KEYWORD;
use crate::plugin::{CallContext, CheckError, PluginKind, PluginRegistry, Stage, first_field};
use crate::runner::assertions::{StageOutcome, run_stage};
use crate::runner::call::ApiCall;
use crate::runner::cancel::CancelToken;
use crate::runner::types::AssertionRecord;
use crate::script::{Script, ScriptChain, TemplateTable};
use crate::utils::{ContentReader, is_textual, loggable_header_value, redirect_target};
use crate::variable::{Binding, Environment, VariableResolver};
use crate::{RavelError, Result};

const STATUS_KEYWORD: &str = "status";

/// 单个脚本的执行流水线
///
/// 依次执行：条件判断、绑定环境、前置条件、构造请求体、发送请求、状态检查、
/// 提取变量、断言。每个阶段开始前都会检查取消标志。
pub struct Pipeline<'a> {
    pub(crate) templates: &'a TemplateTable,
    pub(crate) env: &'a mut Environment,
    pub(crate) plugins: &'a PluginRegistry,
    pub(crate) transport: &'a dyn Transport,
    pub(crate) evaluator: &'a dyn Evaluator,
    pub(crate) reader: &'a dyn ContentReader,
    pub(crate) cancel: &'a CancelToken,
    /// 本次运行中此前失败的断言数，用于默认的 `if` 条件
    pub(crate) prior_failures: usize,
}

impl<'a> Pipeline<'a> {
    /// 执行脚本，结果写入 `call`
    ///
    /// 断言失败只记录在 `call` 中；硬错误以 `Err` 返回。
    pub async fn run(&mut self, script: &Script, call: &mut ApiCall) -> Result<()> {
        if !script.is_runnable() {
            tracing::debug!("{} is a template; not run", script.name());
            return Ok(());
        }
        let chain = ScriptChain::new(script, self.templates)?;

        if self.check_canceled(call) {
            return Ok(());
        }
        if !self.condition(&chain)? {
            tracing::info!("Skipping {}: if condition is false", script.name());
            call.condition_skipped = true;
            return Ok(());
        }

        if self.check_canceled(call) {
            return Ok(());
        }
        self.bind_env(&chain)?;

        match self.run_assertions(&chain, Stage::Preconditions, call)? {
            StageOutcome::Completed => {}
            StageOutcome::Failed => return Ok(()),
            StageOutcome::Canceled => {
                call.canceled = true;
                return Ok(());
            }
        }

        if self.check_canceled(call) {
            return Ok(());
        }
        call.request_body = self.build_body(&chain, call)?;

        if self.check_canceled(call) {
            return Ok(());
        }
        if !self.invoke(&chain, call).await? {
            return Ok(());
        }

        if self.check_canceled(call) {
            return Ok(());
        }
        if !self.extract(&chain, call)? {
            call.canceled = true;
            return Ok(());
        }

        if self.check_canceled(call) {
            return Ok(());
        }
        if self.run_assertions(&chain, Stage::Assert, call)? == StageOutcome::Canceled {
            call.canceled = true;
        }
        Ok(())
    }

    fn check_canceled(&self, call: &mut ApiCall) -> bool {
        if self.cancel.is_canceled() {
            tracing::debug!("{} canceled", call.script);
            call.canceled = true;
        }
        call.canceled
    }

    fn context<'c>(&'c mut self, call: &'c mut ApiCall) -> CallContext<'c> {
        CallContext {
            call,
            env: &mut *self.env,
            evaluator: self.evaluator,
            reader: self.reader,
        }
    }

    /// `if` 条件从最外层模板开始按 AND 组合；都未定义时要求此前没有失败的断言
    fn condition(&self, chain: &ScriptChain<'_>) -> Result<bool> {
        let mut composed: Option<bool> = None;
        for link in chain.outermost_first() {
            if composed == Some(false) {
                return Ok(false);
            }
            if let Some(condition) = link.field("if") {
                composed = Some(self.evaluate_condition(condition)?);
            }
        }
        Ok(composed.unwrap_or(self.prior_failures == 0))
    }

    fn evaluate_condition(&self, condition: &Value) -> Result<bool> {
        let result = match condition {
            Value::Bool(b) => return Ok(*b),
            Value::String(text) => match self.env.get(text) {
                Some(binding) => binding.clone(),
                None => self.evaluator.eval(text, self.env)?,
            },
            other => {
                return Err(RavelError::InvalidCondition(format!(
                    "if condition must be a boolean or expression string; found {}",
                    other
                )));
            }
        };
        result.as_bool().ok_or_else(|| {
            RavelError::InvalidCondition(format!(
                "if condition {} produced {} instead of a boolean",
                condition,
                result.type_name()
            ))
        })
    }

    /// 从最外层模板开始绑定 `env`，每一层都把自己的名字绑定到 `name`
    fn bind_env(&mut self, chain: &ScriptChain<'_>) -> Result<()> {
        for link in chain.outermost_first() {
            self.env.bind("name", link.name());

            let Some(spec) = link.field("env") else {
                continue;
            };
            let Value::Object(spec) = spec else {
                return Err(RavelError::ScriptError(format!(
                    "env in {} must be an object; found {}",
                    link.name(),
                    spec
                )));
            };

            for (name, value) in spec {
                let binding = match value {
                    Value::String(s) => Binding::String(VariableResolver::expand(s, self.env)),
                    Value::Object(_) | Value::Array(_) => {
                        Binding::Json(VariableResolver::expand_json(value, self.env))
                    }
                    scalar => Binding::native(scalar.clone()),
                };
                tracing::trace!("env {} = {}", name, binding);
                self.env.bind(name.as_str(), binding);
            }
        }
        Ok(())
    }

    fn run_assertions(
        &mut self,
        chain: &ScriptChain<'_>,
        stage: Stage,
        call: &mut ApiCall,
    ) -> Result<StageOutcome> {
        let plugins = self.plugins;
        let cancel = self.cancel;
        let mut ctx = self.context(call);
        run_stage(chain, stage, plugins, cancel, &mut ctx)
    }

    fn holds_json(&self, text: &str) -> bool {
        redirect_target(text).is_none() && self.env.get(text).is_some_and(Binding::is_json)
    }

    /// 构造请求体
    ///
    /// 普通字符串展开后直接作为请求体，`@` 开头时读取文件字节；对象、数组和指向 JSON
    /// 绑定的变量名交给请求体生成器。
    fn build_body(
        &mut self,
        chain: &ScriptChain<'_>,
        call: &mut ApiCall,
    ) -> Result<Option<Vec<u8>>> {
        let Some((_, body)) = chain.first_defined("body") else {
            return Ok(None);
        };

        if let Value::String(raw) = body {
            if !self.holds_json(raw) {
                let text = VariableResolver::expand(raw, self.env);
                return match redirect_target(&text) {
                    Some(location) => Ok(Some(self.reader.read_bytes(location)?)),
                    None => Ok(Some(text.into_bytes())),
                };
            }
        }

        let plugins = self.plugins;
        let (keyword, directive) = match body {
            Value::Object(map)
                if first_field(map)
                    .is_some_and(|(k, _)| plugins.contains(k, PluginKind::BodyGenerator)) =>
            {
                let keyword = map.keys().next().cloned().unwrap_or_default();
                (keyword, map.clone())
            }
            other => {
                let mut wrapped = Map::new();
                wrapped.insert(DEFAULT_BODY_KEYWORD.to_string(), other.clone());
                (DEFAULT_BODY_KEYWORD.to_string(), wrapped)
            }
        };

        let generator = plugins
            .body_generator(&keyword)
            .ok_or_else(|| RavelError::UnknownPlugin {
                kind: PluginKind::BodyGenerator,
                keyword: keyword.clone(),
            })?;
        let mut ctx = self.context(call);
        let bytes = generator.generate(chain.script(), &directive, &mut ctx)?;
        tracing::trace!("{} body generator produced {} bytes", keyword, bytes.len());
        Ok(Some(bytes))
    }

    /// 链上第一个 `auth` 决定认证插件
    fn authenticate(&mut self, chain: &ScriptChain<'_>, call: &mut ApiCall) -> Result<()> {
        let Some((_, auth)) = chain.first_defined("auth") else {
            return Ok(());
        };
        let Value::Object(directive) = auth else {
            return Err(RavelError::ScriptError(format!(
                "auth must be an object; found {}",
                auth
            )));
        };
        let Some((keyword, _)) = first_field(directive) else {
            return Err(RavelError::ScriptError("auth object is empty".to_string()));
        };

        let authenticator =
            self.plugins
                .authenticator(keyword)
                .ok_or_else(|| RavelError::UnknownPlugin {
                    kind: PluginKind::Authenticator,
                    keyword: keyword.to_string(),
                })?;
        let mut ctx = self.context(call);
        authenticator.authenticate(chain.script(), directive, &mut ctx)
    }

    /// 发送请求并检查状态码
    ///
    /// 返回 false 表示后续阶段不再执行（状态检查失败或已取消）。
    async fn invoke(&mut self, chain: &ScriptChain<'_>, call: &mut ApiCall) -> Result<bool> {
        let Some((method, uri)) = chain.method_and_uri()? else {
            tracing::warn!(
                "Script {} does not define an HTTP method or URI",
                chain.script().name()
            );
            return Ok(true);
        };

        let uri = VariableResolver::expand(&uri, self.env);
        call.method = Some(method);
        call.uri = Some(uri.clone());
        call.request_headers = chain.headers(self.env)?;
        self.authenticate(chain, call)?;

        log_request(call);
        if self.check_canceled(call) {
            return Ok(false);
        }

        let request = Request::new(method, uri)
            .with_headers(call.request_headers.clone())
            .with_body(call.request_body.clone());
        let response = self.transport.send(request).await?;
        call.record_response(response);

        let status = call.status.unwrap_or_default();
        tracing::info!(
            "{} took {}ms, returned HTTP status {}",
            method,
            call.elapsed.map(|d| d.as_millis()).unwrap_or_default(),
            status
        );
        log_response(call);

        self.env.bind("status", i64::from(status));
        if self.check_canceled(call) {
            return Ok(false);
        }
        self.check_status(chain, call)
    }

    /// 显式的 `status` 断言优先，否则要求 2xx；失败记录为断言失败
    fn check_status(&mut self, chain: &ScriptChain<'_>, call: &mut ApiCall) -> Result<bool> {
        let status = call.status.unwrap_or_default();

        let failure = match chain.status_assertion() {
            Some(directive) => {
                let assertion = self.plugins.assertion(STATUS_KEYWORD).ok_or_else(|| {
                    RavelError::UnknownPlugin {
                        kind: PluginKind::Assertion,
                        keyword: STATUS_KEYWORD.to_string(),
                    }
                })?;
                let mut ctx = self.context(call);
                match assertion.check(chain.script(), &directive, Stage::Assert, &mut ctx) {
                    Ok(()) => None,
                    Err(CheckError::Failed(message)) => Some((Value::Object(directive), message)),
                    Err(CheckError::Error(error)) => return Err(error),
                }
            }
            None if (200..300).contains(&status) => None,
            None => Some((
                json!({ "status": "2.." }),
                format!("http status {} not a 2xx status.", status),
            )),
        };

        match failure {
            Some((directive, message)) => {
                tracing::warn!("{}: {}", call.script, message);
                call.failed
                    .push(AssertionRecord::new(STATUS_KEYWORD, directive).with_message(message));
                Ok(false)
            }
            None => Ok(true),
        }
    }

    /// 从最外层模板开始执行 `bind`
    ///
    /// 单个对象中的未知关键字是错误；数组中的未知关键字被跳过。返回 false 表示已取消。
    fn extract(&mut self, chain: &ScriptChain<'_>, call: &mut ApiCall) -> Result<bool> {
        let plugins = self.plugins;

        for link in chain.outermost_first() {
            let Some(bind) = link.field("bind") else {
                continue;
            };
            let (items, single) = match bind {
                Value::Object(_) => (vec![bind.clone()], true),
                Value::Array(items) => (items.clone(), false),
                other => {
                    return Err(RavelError::ScriptError(format!(
                        "bind must be an object or array; found {}",
                        other
                    )));
                }
            };

            for item in items {
                if self.cancel.is_canceled() {
                    return Ok(false);
                }
                let directive = match item {
                    Value::Object(directive) => directive,
                    other => {
                        return Err(RavelError::ScriptError(format!(
                            "bind items must be objects; found {}",
                            other
                        )));
                    }
                };
                let Some((keyword, _)) = first_field(&directive) else {
                    return Err(RavelError::ScriptError("bind object is empty".to_string()));
                };

                match plugins.extractor(keyword) {
                    Some(extractor) => {
                        let mut ctx = self.context(call);
                        extractor.extract(chain.script(), &directive, &mut ctx)?;
                    }
                    None if single => {
                        return Err(RavelError::UnknownPlugin {
                            kind: PluginKind::Extractor,
                            keyword: keyword.to_string(),
                        });
                    }
                    None => tracing::debug!("No extractor for {}; skipped", keyword),
                }
            }
        }
        Ok(true)
    }
}

fn log_request(call: &ApiCall) {
    if let (Some(method), Some(uri)) = (&call.method, &call.uri) {
        tracing::info!("{} {}", method, uri);
    }
    for (name, value) in call.request_headers.iter() {
        tracing::info!("{}: {}", name, loggable_header_value(name, value));
    }
    if let Some(body) = call.request_text() {
        if !call.request_headers.contains("content-type")
            || call.request_headers.content_type_matches(is_textual)
        {
            tracing::debug!("{}", body);
        }
    }
}

fn log_response(call: &ApiCall) {
    for (name, value) in call.response_headers.iter() {
        tracing::debug!("{}: {}", name, value);
    }
    if !call.response_body.is_empty() && call.response_headers.content_type_matches(is_textual) {
        tracing::debug!("{}", call.response_text());
    }
}
