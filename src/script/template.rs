use std::collections::HashSet;

use serde_json::{Map, Value};

use crate::http::{Headers, Method};
use crate::script::TemplateTable;
use crate::script::model::{IMPLICIT_TEMPLATE, Script};
use crate::variable::{Environment, VariableResolver};
use crate::{RavelError, Result};

/// 脚本及其模板链，按从内到外的顺序保存
///
/// 字段查找从脚本自身开始，逐级回退到模板；请求头、环境、断言和提取器则从最外层
/// 模板开始依次应用。
#[derive(Debug)]
pub struct ScriptChain<'a> {
    links: Vec<&'a Script>,
}

impl<'a> ScriptChain<'a> {
    /// 沿模板名称构建链
    ///
    /// 显式声明的模板必须存在；隐式模板不存在时忽略。模板之间出现循环时报错。
    pub fn new(script: &'a Script, templates: &'a TemplateTable) -> Result<Self> {
        let mut links = vec![script];
        let mut visited = HashSet::from([script.name()]);
        let mut current = script;

        while let Some(parent) = current.parent_name() {
            let Some(template) = templates.get(parent) else {
                if current.has_explicit_template() || parent != IMPLICIT_TEMPLATE {
                    return Err(RavelError::TemplateNotFound(parent.to_string()));
                }
                break;
            };
            if !visited.insert(template.name()) {
                return Err(RavelError::ScriptError(format!(
                    "template cycle detected at {}",
                    template.name()
                )));
            }
            links.push(template);
            current = template;
        }

        Ok(Self { links })
    }

    pub fn script(&self) -> &'a Script {
        self.links[0]
    }

    /// 从内到外
    pub fn innermost_first(&self) -> impl Iterator<Item = &'a Script> + '_ {
        self.links.iter().copied()
    }

    /// 从外到内
    pub fn outermost_first(&self) -> impl Iterator<Item = &'a Script> + '_ {
        self.links.iter().rev().copied()
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// 链中第一个定义了 `key` 的脚本及其取值
    pub fn first_defined(&self, key: &str) -> Option<(&'a Script, &'a Value)> {
        self.innermost_first()
            .find_map(|script| script.field(key).map(|value| (script, value)))
    }

    /// 解析 HTTP 方法和 URI
    ///
    /// 第一个包含方法关键字的层级生效；同一层级出现多个方法时后出现的覆盖前面的，
    /// 外层模板中多余的方法关键字被忽略。两种情况都会记录警告。
    pub fn method_and_uri(&self) -> Result<Option<(Method, String)>> {
        let mut resolved: Option<(Method, String)> = None;

        for script in self.innermost_first() {
            let mut found: Option<(Method, &Value)> = None;
            for (key, value) in script.root() {
                let Some(method) = Method::from_keyword(key) else {
                    continue;
                };
                if let Some((previous, _)) = &found {
                    tracing::warn!(
                        "Script {} defines both {} and {}; using {}",
                        script.name(),
                        previous,
                        method,
                        method
                    );
                }
                found = Some((method, value));
            }

            let Some((method, value)) = found else {
                continue;
            };
            if let Some((defined, uri)) = &resolved {
                tracing::warn!(
                    "HTTP method {} in {} ignored; method already defined as {} {}",
                    method,
                    script.name(),
                    defined,
                    uri
                );
                continue;
            }
            let Value::String(uri) = value else {
                return Err(RavelError::ScriptError(format!(
                    "{} URI must be a string; found {}",
                    method, value
                )));
            };
            resolved = Some((method, uri.clone()));
        }
        Ok(resolved)
    }

    /// 合并整个链上的请求头，外层模板在前，取值展开变量
    pub fn headers(&self, env: &Environment) -> Result<Headers> {
        let mut headers = Headers::new();
        for script in self.outermost_first() {
            let Some(spec) = script.field("headers") else {
                continue;
            };
            let Value::Object(spec) = spec else {
                return Err(RavelError::ScriptError(format!(
                    "headers in {} must be an object; found {}",
                    script.name(),
                    spec
                )));
            };
            for (name, value) in spec {
                match value {
                    Value::String(s) => headers.add(name, VariableResolver::expand(s, env)),
                    Value::Array(items) => {
                        for item in items {
                            let Value::String(s) = item else {
                                return Err(header_value_error(name, item));
                            };
                            headers.add(name, VariableResolver::expand(s, env));
                        }
                    }
                    other => return Err(header_value_error(name, other)),
                }
            }
        }
        Ok(headers)
    }

    /// 链上显式声明的 `status` 断言
    pub fn status_assertion(&self) -> Option<Map<String, Value>> {
        self.innermost_first().find_map(|script| {
            let directives: Vec<&Value> = match script.field("assert")? {
                Value::Array(items) => items.iter().collect(),
                single => vec![single],
            };
            directives.into_iter().find_map(|directive| match directive {
                Value::Object(map) if map.keys().next().map(String::as_str) == Some("status") => {
                    Some(map.clone())
                }
                _ => None,
            })
        })
    }
}

fn header_value_error(name: &str, value: &Value) -> RavelError {
    RavelError::ScriptError(format!(
        "header {} must be a string or array of strings; found {}",
        name, value
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn script(value: Value) -> Script {
        Script::from_value(value, &Environment::new(), || "unnamed".to_string()).unwrap()
    }

    fn table(templates: Vec<Value>) -> TemplateTable {
        templates
            .into_iter()
            .map(script)
            .map(|s| (s.name().to_string(), s))
            .collect()
    }

    #[test]
    fn test_chain_with_implicit_template() {
        let templates = table(vec![
            json!({"name": "implicit.template", "headers": {"Accept": "application/json"}}),
            json!({"name": "base.template", "GET": "http://localhost/base"}),
        ]);
        let child = script(json!({"name": "child", "template": "base"}));

        let chain = ScriptChain::new(&child, &templates).unwrap();
        let names: Vec<&str> = chain.innermost_first().map(Script::name).collect();
        assert_eq!(names, vec!["child", "base.template", "implicit.template"]);

        let plain = script(json!({"name": "plain"}));
        assert_eq!(ScriptChain::new(&plain, &templates).unwrap().len(), 2);
    }

    #[test]
    fn test_missing_template() {
        let templates = TemplateTable::new();
        let child = script(json!({"name": "child", "template": "nope"}));
        assert!(matches!(
            ScriptChain::new(&child, &templates),
            Err(RavelError::TemplateNotFound(name)) if name == "nope.template"
        ));

        let plain = script(json!({"name": "plain"}));
        assert_eq!(ScriptChain::new(&plain, &templates).unwrap().len(), 1);
    }

    #[test]
    fn test_template_cycle() {
        let templates = table(vec![
            json!({"name": "a.template", "template": "b"}),
            json!({"name": "b.template", "template": "a"}),
        ]);
        let child = script(json!({"name": "child", "template": "a"}));
        assert!(matches!(
            ScriptChain::new(&child, &templates),
            Err(RavelError::ScriptError(_))
        ));
    }

    #[test]
    fn test_method_and_uri_inherited() {
        let templates = table(vec![json!({"name": "base.template", "POST": "/items"})]);
        let child = script(json!({"name": "child", "template": "base"}));
        let chain = ScriptChain::new(&child, &templates).unwrap();

        let (method, uri) = chain.method_and_uri().unwrap().unwrap();
        assert_eq!(method, Method::Post);
        assert_eq!(uri, "/items");

        let own = script(json!({"name": "own", "template": "base", "delete": "/items/1"}));
        let chain = ScriptChain::new(&own, &templates).unwrap();
        assert_eq!(chain.method_and_uri().unwrap().unwrap().0, Method::Delete);
    }

    #[test]
    fn test_later_method_in_same_script_wins() {
        let templates = table(vec![json!({"name": "base.template", "PUT": "/base"})]);
        let twice = script(json!({
            "name": "twice",
            "template": "base",
            "GET": "/first",
            "POST": "/second"
        }));
        let chain = ScriptChain::new(&twice, &templates).unwrap();

        // 外层模板的 PUT 被忽略
        let (method, uri) = chain.method_and_uri().unwrap().unwrap();
        assert_eq!(method, Method::Post);
        assert_eq!(uri, "/second");
    }

    #[test]
    fn test_method_uri_must_be_string() {
        let templates = TemplateTable::new();
        let bad = script(json!({"name": "bad", "GET": 42}));
        let chain = ScriptChain::new(&bad, &templates).unwrap();
        assert!(chain.method_and_uri().is_err());

        let none = script(json!({"name": "none"}));
        let chain = ScriptChain::new(&none, &templates).unwrap();
        assert!(chain.method_and_uri().unwrap().is_none());
    }

    #[test]
    fn test_headers_accumulate_outermost_first() {
        let templates = table(vec![json!({
            "name": "base.template",
            "headers": {"Accept": "application/json", "X-Trace": "{trace}"}
        })]);
        let child = script(json!({
            "name": "child",
            "template": "base",
            "headers": {"accept": "text/plain", "X-Tags": ["a", "b"]}
        }));
        let mut env = Environment::new();
        env.bind("trace", "t-1");

        let chain = ScriptChain::new(&child, &templates).unwrap();
        let headers = chain.headers(&env).unwrap();

        assert_eq!(headers.get_all("Accept"), ["application/json", "text/plain"]);
        assert_eq!(headers.get("x-trace"), Some("t-1"));
        assert_eq!(headers.get_all("X-Tags"), ["a", "b"]);
    }

    #[test]
    fn test_status_assertion_lookup() {
        let templates = table(vec![json!({
            "name": "base.template",
            "assert": [{"status": 201}, "x == 1"]
        })]);
        let child = script(json!({"name": "child", "template": "base"}));
        let chain = ScriptChain::new(&child, &templates).unwrap();

        assert_eq!(
            chain.status_assertion(),
            json!({"status": 201}).as_object().cloned()
        );

        let other = script(json!({"name": "other", "assert": {"status": [200, 204]}}));
        let empty = TemplateTable::new();
        let chain = ScriptChain::new(&other, &empty).unwrap();
        assert!(chain.status_assertion().is_some());
    }
}
