use std::collections::HashMap;
use std::fmt;

use crate::plugin::traits::{Assertion, Authenticator, BodyGenerator, Extractor};

/// 插件的四个独立命名空间
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PluginKind {
    Assertion,
    Extractor,
    Authenticator,
    BodyGenerator,
}

impl fmt::Display for PluginKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PluginKind::Assertion => "assertion",
            PluginKind::Extractor => "extractor",
            PluginKind::Authenticator => "authenticator",
            PluginKind::BodyGenerator => "body generator",
        })
    }
}

pub type AssertionFactory = fn() -> Box<dyn Assertion>;
pub type ExtractorFactory = fn() -> Box<dyn Extractor>;
pub type AuthenticatorFactory = fn() -> Box<dyn Authenticator>;
pub type BodyGeneratorFactory = fn() -> Box<dyn BodyGenerator>;

/// 插件工厂，每次使用都创建新实例
#[derive(Clone, Copy)]
pub enum PluginFactory {
    Assertion(AssertionFactory),
    Extractor(ExtractorFactory),
    Authenticator(AuthenticatorFactory),
    BodyGenerator(BodyGeneratorFactory),
}

impl PluginFactory {
    pub fn kind(&self) -> PluginKind {
        match self {
            PluginFactory::Assertion(_) => PluginKind::Assertion,
            PluginFactory::Extractor(_) => PluginKind::Extractor,
            PluginFactory::Authenticator(_) => PluginKind::Authenticator,
            PluginFactory::BodyGenerator(_) => PluginKind::BodyGenerator,
        }
    }
}

impl fmt::Debug for PluginFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PluginFactory({})", self.kind())
    }
}

/// 关键字到插件工厂的查找表
///
/// 同一个关键字可以同时注册在不同命名空间中，例如 `headers` 既是断言也是提取器。
#[derive(Debug, Default, Clone)]
pub struct PluginRegistry {
    namespaces: HashMap<PluginKind, HashMap<String, PluginFactory>>,
}

impl PluginRegistry {
    /// 创建空的注册表
    pub fn new() -> Self {
        Self::default()
    }

    /// 创建注册了全部内置插件的注册表
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        crate::plugin::builtin::register_builtins(&mut registry);
        registry
    }

    /// 注册插件，命名空间由工厂类型决定；同名注册会覆盖
    pub fn register(&mut self, keyword: impl Into<String>, factory: PluginFactory) {
        let keyword = keyword.into();
        let kind = factory.kind();
        tracing::trace!("Registering {} plugin '{}'", kind, keyword);
        self.namespaces
            .entry(kind)
            .or_default()
            .insert(keyword, factory);
    }

    pub fn lookup(&self, keyword: &str, kind: PluginKind) -> Option<PluginFactory> {
        self.namespaces
            .get(&kind)
            .and_then(|namespace| namespace.get(keyword))
            .copied()
    }

    pub fn contains(&self, keyword: &str, kind: PluginKind) -> bool {
        self.lookup(keyword, kind).is_some()
    }

    /// 某个命名空间中已注册的关键字（已排序）
    pub fn keywords(&self, kind: PluginKind) -> Vec<&str> {
        let mut keys: Vec<&str> = self
            .namespaces
            .get(&kind)
            .map(|namespace| namespace.keys().map(|k| k.as_str()).collect())
            .unwrap_or_default();
        keys.sort_unstable();
        keys
    }

    pub fn register_assertion(&mut self, keyword: impl Into<String>, factory: AssertionFactory) {
        self.register(keyword, PluginFactory::Assertion(factory));
    }

    pub fn register_extractor(&mut self, keyword: impl Into<String>, factory: ExtractorFactory) {
        self.register(keyword, PluginFactory::Extractor(factory));
    }

    pub fn register_authenticator(
        &mut self,
        keyword: impl Into<String>,
        factory: AuthenticatorFactory,
    ) {
        self.register(keyword, PluginFactory::Authenticator(factory));
    }

    pub fn register_body_generator(
        &mut self,
        keyword: impl Into<String>,
        factory: BodyGeneratorFactory,
    ) {
        self.register(keyword, PluginFactory::BodyGenerator(factory));
    }

    pub fn assertion(&self, keyword: &str) -> Option<Box<dyn Assertion>> {
        match self.lookup(keyword, PluginKind::Assertion)? {
            PluginFactory::Assertion(factory) => Some(factory()),
            _ => None,
        }
    }

    pub fn extractor(&self, keyword: &str) -> Option<Box<dyn Extractor>> {
        match self.lookup(keyword, PluginKind::Extractor)? {
            PluginFactory::Extractor(factory) => Some(factory()),
            _ => None,
        }
    }

    pub fn authenticator(&self, keyword: &str) -> Option<Box<dyn Authenticator>> {
        match self.lookup(keyword, PluginKind::Authenticator)? {
            PluginFactory::Authenticator(factory) => Some(factory()),
            _ => None,
        }
    }

    pub fn body_generator(&self, keyword: &str) -> Option<Box<dyn BodyGenerator>> {
        match self.lookup(keyword, PluginKind::BodyGenerator)? {
            PluginFactory::BodyGenerator(factory) => Some(factory()),
            _ => None,
        }
    }
}
