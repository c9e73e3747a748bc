use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use ravel::http::{Headers, Method, Request, Response, Status, Transport, TransportError};
use ravel::plugin::PluginKind;
use ravel::{Binding, CancelToken, RavelError, Runtime};
use serde_json::json;

/// 记录请求并按 URI 返回预设响应的传输层
#[derive(Clone, Default)]
struct StubTransport {
    routes: Arc<Mutex<HashMap<String, (u16, String)>>>,
    requests: Arc<Mutex<Vec<Request>>>,
    cancel_on: Option<(String, CancelToken)>,
}

impl StubTransport {
    fn route(self, uri: &str, status: u16, body: &str) -> Self {
        self.routes
            .lock()
            .unwrap()
            .insert(uri.to_string(), (status, body.to_string()));
        self
    }

    fn cancel_on(mut self, uri: &str, token: CancelToken) -> Self {
        self.cancel_on = Some((uri.to_string(), token));
        self
    }

    fn requests(&self) -> Vec<Request> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for StubTransport {
    async fn send(&self, request: Request) -> Result<Response, TransportError> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some((uri, token)) = &self.cancel_on {
            if *uri == request.uri {
                token.cancel();
            }
        }

        let (status, body) = self
            .routes
            .lock()
            .unwrap()
            .get(&request.uri)
            .cloned()
            .unwrap_or((200, String::new()));
        let mut headers = Headers::new();
        headers.add("Content-Type", "application/json");
        Ok(Response::new(
            Status::new(status).unwrap(),
            headers,
            body.into_bytes(),
            Duration::from_millis(3),
        ))
    }
}

fn runtime(stub: &StubTransport) -> Runtime {
    Runtime::with_transport(Box::new(stub.clone()))
}

#[tokio::test]
async fn test_method_and_uri_from_template() {
    let stub = StubTransport::default();
    let mut runtime = runtime(&stub);

    runtime
        .execute_value(json!([
            {"name": "items.template", "GET": "http://api/{kind}/{id}"},
            {"name": "get item", "template": "items", "env": {"kind": "items", "id": 7}}
        ]))
        .await
        .unwrap();

    let requests = stub.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, Method::Get);
    assert_eq!(requests[0].uri, "http://api/items/7");
}

#[tokio::test]
async fn test_headers_accumulate_across_chain() {
    let stub = StubTransport::default();
    let mut runtime = runtime(&stub);

    runtime
        .execute_value(json!([
            {"name": "base.template", "headers": {"A": "1"}},
            {"name": "call", "template": "base", "GET": "http://api/h", "headers": {"B": "2"}}
        ]))
        .await
        .unwrap();

    let headers = &stub.requests()[0].headers;
    assert_eq!(headers.get("A"), Some("1"));
    assert_eq!(headers.get("B"), Some("2"));
}

#[tokio::test]
async fn test_implicit_template_applies_to_all_scripts() {
    let stub = StubTransport::default();
    let mut runtime = runtime(&stub);

    runtime
        .execute_value(json!([
            {"name": "implicit.template", "headers": {"X-Client": "ravel"}},
            {"name": "one", "GET": "http://api/1"},
            {"name": "two", "GET": "http://api/2"}
        ]))
        .await
        .unwrap();

    let requests = stub.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests.iter().all(|r| r.headers.get("x-client") == Some("ravel")));
}

#[tokio::test]
async fn test_assertion_short_circuit() {
    let stub = StubTransport::default();
    let mut runtime = runtime(&stub);

    runtime
        .execute_value(json!({
            "name": "abc",
            "GET": "http://api/x",
            "env": {"v": 1},
            "assert": ["v == 1", "v == 2", "v == 3"]
        }))
        .await
        .unwrap();

    let call = &runtime.calls()[0];
    assert_eq!(call.passed.len(), 1);
    assert_eq!(call.failed.len(), 1);
    assert_eq!(call.skipped.len(), 1);
    assert_eq!(call.failed[0].to_string(), "v == 2");
    assert_eq!(call.skipped[0].to_string(), "v == 3");
    assert_eq!(runtime.exit_code(), 1);
}

#[tokio::test]
async fn test_default_status_assertion() {
    let stub = StubTransport::default()
        .route("http://api/broken", 500, "")
        .route("http://api/created", 201, "");
    let mut runtime = runtime(&stub);

    runtime
        .execute_value(json!([
            {"name": "created", "POST": "http://api/created", "assert": "status == 201"},
            {"name": "broken", "GET": "http://api/broken", "if": true, "assert": "true"}
        ]))
        .await
        .unwrap();

    let created = &runtime.calls()[0];
    assert!(created.failed.is_empty());
    assert_eq!(created.passed.len(), 1);

    let broken = &runtime.calls()[1];
    assert_eq!(broken.failed.len(), 1);
    assert_eq!(broken.failed[0].keyword, "status");
    assert_eq!(
        broken.failed[0].message.as_deref(),
        Some("http status 500 not a 2xx status.")
    );
    // 状态检查失败后不再执行后续断言
    assert!(broken.passed.is_empty());
}

#[tokio::test]
async fn test_explicit_status_assertion_in_template() {
    let stub = StubTransport::default().route("http://api/missing", 404, "");
    let mut runtime = runtime(&stub);

    runtime
        .execute_value(json!([
            {"name": "not-found.template", "assert": {"status": 404}},
            {"name": "lookup", "template": "not-found", "GET": "http://api/missing"}
        ]))
        .await
        .unwrap();

    let call = &runtime.calls()[0];
    assert!(call.failed.is_empty());
    assert_eq!(call.passed.len(), 1);
    assert_eq!(runtime.env().get("status"), Some(&Binding::Int(404)));
}

#[tokio::test]
async fn test_conditions() {
    let stub = StubTransport::default();
    let mut runtime = runtime(&stub);

    runtime
        .execute_value(json!([
            {"name": "off.template", "if": false},
            {"name": "skipped", "template": "off", "if": true, "GET": "http://api/a"},
            {"name": "flagged", "env": {"enabled": true}, "GET": "http://api/b"},
            {"name": "by flag", "if": "enabled", "GET": "http://api/c"},
            {"name": "fails", "GET": "http://api/d", "assert": "false"},
            {"name": "after failure", "GET": "http://api/e"},
            {"name": "forced", "if": true, "GET": "http://api/f"}
        ]))
        .await
        .unwrap();

    let uris: Vec<String> = stub.requests().into_iter().map(|r| r.uri).collect();
    assert_eq!(
        uris,
        vec!["http://api/b", "http://api/c", "http://api/d", "http://api/f"]
    );
    assert!(runtime.calls()[0].condition_skipped);
    assert!(runtime.calls()[4].condition_skipped);
}

#[tokio::test]
async fn test_invalid_condition_is_hard_error() {
    let stub = StubTransport::default();
    let mut runtime = runtime(&stub);
    runtime.bind("n", 3i64);

    let result = runtime
        .execute_value(json!({"name": "bad", "if": "n", "GET": "http://api/x"}))
        .await;
    assert!(matches!(result, Err(RavelError::InvalidCondition(_))));
    assert!(stub.requests().is_empty());
}

#[tokio::test]
async fn test_preconditions_gate_request() {
    let stub = StubTransport::default();
    let mut runtime = runtime(&stub);

    runtime
        .execute_value(json!({
            "name": "needs token",
            "preconditions": {"bound": "token"},
            "GET": "http://api/secure"
        }))
        .await
        .unwrap();

    assert!(stub.requests().is_empty());
    assert_eq!(runtime.calls()[0].failed.len(), 1);
}

#[tokio::test]
async fn test_bodies() {
    let stub = StubTransport::default();
    let mut runtime = runtime(&stub);
    runtime.bind("who", "ann");
    runtime.bind("payload", json!({"id": 1}));

    runtime
        .execute_value(json!([
            {"name": "text", "POST": "http://api/t", "body": "hello {who}"},
            {"name": "json", "POST": "http://api/j", "body": {"user": "{who}", "tags": ["a"]}},
            {"name": "var", "POST": "http://api/v", "body": "payload"},
            {"name": "lines", "POST": "http://api/l", "body": {"text": ["a", "{who}"]}}
        ]))
        .await
        .unwrap();

    let bodies: Vec<Vec<u8>> = stub
        .requests()
        .into_iter()
        .map(|r| r.body.unwrap_or_default())
        .collect();
    assert_eq!(bodies[0], b"hello ann");
    assert_eq!(
        serde_json::from_slice::<serde_json::Value>(&bodies[1]).unwrap(),
        json!({"user": "ann", "tags": ["a"]})
    );
    assert_eq!(
        serde_json::from_slice::<serde_json::Value>(&bodies[2]).unwrap(),
        json!({"id": 1})
    );
    assert_eq!(bodies[3], b"a\nann");
}

#[tokio::test]
async fn test_extracted_values_flow_to_later_scripts() {
    let stub = StubTransport::default().route("http://api/login", 200, r#"{"token": "t-9", "id": 4}"#);
    let mut runtime = runtime(&stub);

    runtime
        .execute_value(json!([
            {
                "name": "login",
                "POST": "http://api/login",
                "bind": [{"json": "session"}, {"unknownExtractor": "ignored"}],
                "assert": ["session.id == 4", {"equal": ["{@session@}", {"token": "t-9", "id": 4}]}]
            },
            {
                "name": "profile",
                "GET": "http://api/profile",
                "auth": {"bearer": "{token|none}"},
                "env": {"token": "t-9"}
            }
        ]))
        .await
        .unwrap();

    assert_eq!(runtime.calls()[0].passed.len(), 2);
    let requests = stub.requests();
    assert_eq!(requests[1].headers.get("Authorization"), Some("Bearer t-9"));
    assert!(runtime.env().get("session").is_some_and(Binding::is_json));
}

#[tokio::test]
async fn test_unknown_plugins_are_hard_errors() {
    let stub = StubTransport::default();
    let mut runtime = runtime(&stub);

    let result = runtime
        .execute_value(json!({"name": "x", "GET": "http://api/x", "bind": {"nonesuch": "v"}}))
        .await;
    assert!(matches!(
        result,
        Err(RavelError::UnknownPlugin { kind: PluginKind::Extractor, .. })
    ));

    let result = runtime
        .execute_value(json!({"name": "y", "GET": "http://api/y", "auth": {"kerberos": {}}}))
        .await;
    assert!(matches!(
        result,
        Err(RavelError::UnknownPlugin { kind: PluginKind::Authenticator, .. })
    ));
}

#[tokio::test]
async fn test_env_binding_types_and_name() {
    let stub = StubTransport::default();
    let mut runtime = runtime(&stub);

    runtime
        .execute_value(json!({
            "name": "typed",
            "env": {"i": 3, "f": 1.5, "b": false, "s": "x{i}", "o": {"k": "{s}"}}
        }))
        .await
        .unwrap();

    let env = runtime.env();
    assert_eq!(env.get("name"), Some(&Binding::String("typed".to_string())));
    assert_eq!(env.get("i"), Some(&Binding::Int(3)));
    assert_eq!(env.get("f"), Some(&Binding::Float(1.5)));
    assert_eq!(env.get("b"), Some(&Binding::Bool(false)));
    assert_eq!(env.get("s"), Some(&Binding::String("x3".to_string())));
    assert_eq!(env.get("o"), Some(&Binding::Json(json!({"k": "x3"}))));
    // 未定义方法和 URI 时不发送请求
    assert!(stub.requests().is_empty());
}

#[tokio::test]
async fn test_cancel_mid_run() {
    let token = CancelToken::new();
    let stub = StubTransport::default().cancel_on("http://api/2", token.clone());
    let mut runtime = Runtime::with_transport(Box::new(stub.clone())).with_cancel_token(token);

    runtime
        .execute_value(json!([
            {"name": "one", "GET": "http://api/1", "assert": "status == 200"},
            {"name": "two", "GET": "http://api/2", "assert": "status == 200"},
            {"name": "three", "GET": "http://api/3", "assert": "status == 200"}
        ]))
        .await
        .unwrap();

    let summary = runtime.report();
    assert_eq!(summary.passed, 1);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.skipped, 0);
    assert_eq!(summary.canceled, 2);
    assert_eq!(stub.requests().len(), 2);
}

#[tokio::test]
async fn test_cancel_during_call_skips_status_check() {
    let token = CancelToken::new();
    let stub = StubTransport::default()
        .route("http://api/2", 500, "")
        .cancel_on("http://api/2", token.clone());
    let mut runtime = Runtime::with_transport(Box::new(stub.clone())).with_cancel_token(token);

    runtime
        .execute_value(json!([
            {"name": "one", "GET": "http://api/1", "assert": "status == 200"},
            {"name": "two", "GET": "http://api/2"},
            {"name": "three", "GET": "http://api/3"}
        ]))
        .await
        .unwrap();

    let two = &runtime.calls()[1];
    assert!(two.canceled);
    assert_eq!(two.status, Some(500));
    assert!(two.failed.is_empty());

    let summary = runtime.report();
    assert_eq!(summary.passed, 1);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.canceled, 2);
    assert_eq!(runtime.exit_code(), 0);
}
