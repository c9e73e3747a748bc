mod assertions;
mod auth;
mod extractors;
mod generators;

pub use assertions::{BoundAssertion, EqualAssertion, ExprAssertion, HeadersAssertion, StatusAssertion};
pub use auth::{BasicAuth, BearerAuth};
pub use extractors::{HeadersExtractor, JsonExtractor, PatternExtractor, TextExtractor};
pub use generators::{BinaryBody, JsonBody, TextBody};

use crate::plugin::registry::PluginRegistry;

/// 字符串形式的断言使用的关键字
pub const EXPR_KEYWORD: &str = "expr";

/// 未指定生成器的请求体使用的关键字
pub const DEFAULT_BODY_KEYWORD: &str = "json";

/// 注册全部内置插件
pub fn register_builtins(registry: &mut PluginRegistry) {
    registry.register_assertion("status", || Box::new(StatusAssertion));
    registry.register_assertion("headers", || Box::new(HeadersAssertion));
    registry.register_assertion("header", || Box::new(HeadersAssertion));
    registry.register_assertion(EXPR_KEYWORD, || Box::new(ExprAssertion));
    registry.register_assertion("bound", || Box::new(BoundAssertion));
    registry.register_assertion("equal", || Box::new(EqualAssertion));

    registry.register_extractor("json", || Box::new(JsonExtractor));
    registry.register_extractor("text", || Box::new(TextExtractor));
    registry.register_extractor("headers", || Box::new(HeadersExtractor));
    registry.register_extractor("pattern", || Box::new(PatternExtractor));

    registry.register_authenticator("basic", || Box::new(BasicAuth));
    registry.register_authenticator("basicAuth", || Box::new(BasicAuth));
    registry.register_authenticator("bearer", || Box::new(BearerAuth));

    registry.register_body_generator(DEFAULT_BODY_KEYWORD, || Box::new(JsonBody));
    registry.register_body_generator("text", || Box::new(TextBody));
    registry.register_body_generator("binary", || Box::new(BinaryBody));
}
