use crate::variable::types::Environment;
use regex::{Captures, Regex};
use serde_json::Value;
use std::sync::OnceLock;

const OPENING_BRACE: char = '{';
const DELIMITER: char = '|';
const CLOSING_BRACE: char = '}';

/// 变量替换器
///
/// 支持的语法：
/// - `{name}` 替换为变量的字符串形式，null 绑定替换为 `null`
/// - `{name|alt}` 变量未绑定时使用 alt，alt 本身可以包含引用
/// - `{U+hhhh}` 替换为对应的 Unicode 字符
/// - 引用可以嵌套，内层先展开
///
/// 无法解析的引用原样保留，不视为错误。
pub struct VariableResolver;

impl VariableResolver {
    /// 展开文本中的所有变量引用
    pub fn expand(input: &str, env: &Environment) -> String {
        if !input.contains(OPENING_BRACE) || !input.contains(CLOSING_BRACE) {
            return input.to_string();
        }
        // 每次调用使用独立的扫描状态
        Scanner::new(input, env).run()
    }

    /// 递归展开 JSON 值中的所有字符串叶子节点
    pub fn expand_json(value: &Value, env: &Environment) -> Value {
        match value {
            Value::String(s) => Value::String(Self::expand(s, env)),
            Value::Array(items) => {
                Value::Array(items.iter().map(|v| Self::expand_json(v, env)).collect())
            }
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), Self::expand_json(v, env)))
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    /// 与 `expand_json` 相同，但 `{@name@}` 整值引用替换为绑定的类型化值；
    /// 变量未绑定时保留原文
    pub fn substitute_json(value: &Value, env: &Environment) -> Value {
        match value {
            Value::String(s) => match Self::value_reference(s).and_then(|name| env.get(name)) {
                Some(binding) => binding.to_json(),
                None => Value::String(Self::expand(s, env)),
            },
            Value::Array(items) => {
                Value::Array(items.iter().map(|v| Self::substitute_json(v, env)).collect())
            }
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), Self::substitute_json(v, env)))
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    /// 整值引用 `{@name@}`，返回其中的变量名
    pub fn value_reference(text: &str) -> Option<&str> {
        static VALUE_REF_REGEX: OnceLock<Regex> = OnceLock::new();
        let re = VALUE_REF_REGEX.get_or_init(|| Regex::new(r"^\{@([-\w.$]+)@\}$").unwrap());

        re.captures(text).and_then(|caps| caps.get(1)).map(|m| m.as_str())
    }

    /// 变量名语法：字母数字、`_`、`.`、`$`、`-`
    pub fn is_variable_name(candidate: &str) -> bool {
        static VAR_NAME_REGEX: OnceLock<Regex> = OnceLock::new();
        let re = VAR_NAME_REGEX.get_or_init(|| Regex::new(r"^[-\w.$]+$").unwrap());

        re.is_match(candidate)
    }

    /// 解析 `U+hhhh` 形式的码点
    pub fn unicode_character(candidate: &str) -> Option<char> {
        static UNICODE_REGEX: OnceLock<Regex> = OnceLock::new();
        let re = UNICODE_REGEX.get_or_init(|| Regex::new(r"^[Uu]\+[0-9A-Fa-f]{4}$").unwrap());

        if !re.is_match(candidate) {
            return None;
        }
        u32::from_str_radix(&candidate[2..], 16)
            .ok()
            .and_then(char::from_u32)
    }

    /// 解析并替换系统环境变量 ${VAR}
    pub fn resolve_env_vars(text: &str) -> String {
        static ENV_REGEX: OnceLock<Regex> = OnceLock::new();
        let re = ENV_REGEX.get_or_init(|| Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").unwrap());

        re.replace_all(text, |caps: &Captures| {
            let env_name = &caps[1];
            std::env::var(env_name).unwrap_or_else(|_| caps[0].to_string())
        })
        .to_string()
    }
}

/// 单次展开的扫描状态
struct Scanner<'a> {
    input: Vec<char>,
    index: usize,
    result: String,
    env: &'a Environment,
}

impl<'a> Scanner<'a> {
    fn new(input: &str, env: &'a Environment) -> Self {
        Self {
            input: input.chars().collect(),
            index: 0,
            result: String::with_capacity(input.len()),
            env,
        }
    }

    fn run(mut self) -> String {
        while self.index < self.input.len() {
            let c = self.input[self.index];
            if c == OPENING_BRACE {
                self.resolve_var();
            } else {
                self.result.push(c);
                self.index += 1;
            }
        }
        self.result
    }

    /// 处理从当前 `{` 开始的一个引用
    fn resolve_var(&mut self) {
        self.index += 1;
        if !self.has_matching_close_brace() {
            self.result.push(OPENING_BRACE);
            return;
        }

        let var_pos = self.index;
        while self.index < self.input.len() {
            match self.input[self.index] {
                OPENING_BRACE => {
                    // 嵌套引用：保留已读的前缀，展开内层后继续到外层的 `}`
                    self.copy_range(var_pos - 1, self.index);
                    self.resolve_var();
                    self.scan_to_close_brace(true);
                    self.result.push(CLOSING_BRACE);
                    return;
                }
                CLOSING_BRACE => {
                    let name = self.slice(var_pos, self.index);
                    self.index += 1;
                    if let Some(value) = self.lookup(&name) {
                        self.result.push_str(&value);
                    } else if let Some(ch) = VariableResolver::unicode_character(&name) {
                        self.result.push(ch);
                    } else {
                        self.result.push(OPENING_BRACE);
                        self.result.push_str(&name);
                        self.result.push(CLOSING_BRACE);
                    }
                    return;
                }
                DELIMITER => {
                    let name = self.slice(var_pos, self.index);
                    self.index += 1;
                    if VariableResolver::is_variable_name(&name) {
                        match self.lookup(&name) {
                            Some(value) => {
                                self.result.push_str(&value);
                                self.scan_to_close_brace(false);
                            }
                            None => self.scan_to_close_brace(true),
                        }
                    } else {
                        self.result.push(OPENING_BRACE);
                        self.result.push_str(&name);
                        self.result.push(DELIMITER);
                        self.scan_to_close_brace(true);
                        self.result.push(CLOSING_BRACE);
                    }
                    return;
                }
                _ => self.index += 1,
            }
        }
    }

    /// 当前 `{` 之后是否存在匹配的 `}`
    fn has_matching_close_brace(&self) -> bool {
        let mut depth = 1usize;
        for &ch in &self.input[self.index..] {
            if ch == OPENING_BRACE {
                depth += 1;
            } else if ch == CLOSING_BRACE {
                depth -= 1;
                if depth == 0 {
                    return true;
                }
            }
        }
        false
    }

    /// 扫描到匹配的 `}` 为止。copy 为 true 时复制并展开途经的内容，否则直接跳过。
    /// 调用前必须已确认存在匹配的 `}`。
    fn scan_to_close_brace(&mut self, copy: bool) {
        while self.index < self.input.len() {
            match self.input[self.index] {
                OPENING_BRACE => {
                    if copy {
                        self.resolve_var();
                    } else {
                        self.index += 1;
                        self.scan_to_close_brace(false);
                    }
                }
                CLOSING_BRACE => {
                    self.index += 1;
                    return;
                }
                c => {
                    if copy {
                        self.result.push(c);
                    }
                    self.index += 1;
                }
            }
        }
    }

    fn lookup(&self, name: &str) -> Option<String> {
        if !VariableResolver::is_variable_name(name) {
            return None;
        }
        self.env.get(name).map(|value| value.to_string())
    }

    fn slice(&self, from: usize, to: usize) -> String {
        self.input[from..to].iter().collect()
    }

    fn copy_range(&mut self, from: usize, to: usize) {
        self.result.extend(&self.input[from..to]);
    }
}
