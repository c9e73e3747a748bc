pub mod model;
pub mod template;

use std::collections::HashMap;

pub use model::{IMPLICIT_TEMPLATE, Script, TEMPLATE_SUFFIX};
pub use template::ScriptChain;

/// 模板名称到模板脚本的映射，由 Runtime 持有
pub type TemplateTable = HashMap<String, Script>;
