use ravel::plugin::PluginKind;
use ravel::{RavelError, Result};

#[test]
fn test_script_error() {
    let err = RavelError::ScriptError("test error".to_string());
    assert_eq!(err.to_string(), "脚本格式错误: test error");
}

#[test]
fn test_unknown_plugin() {
    let err = RavelError::UnknownPlugin {
        kind: PluginKind::BodyGenerator,
        keyword: "yaml".to_string(),
    };
    assert_eq!(err.to_string(), "未注册的 body generator 插件: yaml");
}

#[test]
fn test_template_not_found() {
    let err = RavelError::TemplateNotFound("base.template".to_string());
    assert_eq!(err.to_string(), "找不到模板: base.template");
}

#[test]
fn test_error_conversion_from_anyhow() {
    let anyhow_err = anyhow::anyhow!("test anyhow error");
    let ravel_err: RavelError = anyhow_err.into();
    assert!(ravel_err.to_string().contains("test anyhow error"));
}

#[test]
fn test_error_conversion_from_json() {
    let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
    let ravel_err: RavelError = json_err.into();
    assert!(matches!(ravel_err, RavelError::JsonError(_)));
}

#[test]
fn test_result_type() {
    fn returns_error() -> Result<()> {
        Err(RavelError::InvalidCondition("test".to_string()))
    }

    let result = returns_error();
    assert!(result.is_err());
    match result {
        Err(RavelError::InvalidCondition(msg)) => assert_eq!(msg, "test"),
        _ => panic!("Expected InvalidCondition"),
    }
}
