use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::{Map, Value};

use crate::plugin::traits::{Authenticator, CallContext, first_field};
use crate::script::Script;
use crate::{RavelError, Result};

const AUTHORIZATION: &str = "Authorization";

fn required_string<'a>(spec: &'a Map<String, Value>, field: &str) -> Result<&'a str> {
    spec.get(field).and_then(Value::as_str).ok_or_else(|| {
        RavelError::ScriptError(format!("auth requires a string '{}' field", field))
    })
}

/// `{"basic": {"user": "{user}", "password": "{password}"}}`
pub struct BasicAuth;

impl Authenticator for BasicAuth {
    fn authenticate(
        &self,
        _script: &Script,
        directive: &Map<String, Value>,
        call: &mut CallContext<'_>,
    ) -> Result<()> {
        let Some((_, Value::Object(spec))) = first_field(directive) else {
            return Err(RavelError::ScriptError(
                "basic auth requires an object with user and password".to_string(),
            ));
        };

        let user = call.expand(required_string(spec, "user")?);
        let password = call.expand(required_string(spec, "password")?);
        let credentials = STANDARD.encode(format!("{}:{}", user, password));

        tracing::debug!("Using basic authentication for user {}", user);
        call.call
            .request_headers
            .set(AUTHORIZATION, format!("Basic {}", credentials));
        Ok(())
    }
}

/// `{"bearer": "{token}"}` 或 `{"bearer": {"token": "{token}"}}`
pub struct BearerAuth;

impl Authenticator for BearerAuth {
    fn authenticate(
        &self,
        _script: &Script,
        directive: &Map<String, Value>,
        call: &mut CallContext<'_>,
    ) -> Result<()> {
        let token = match first_field(directive) {
            Some((_, Value::String(token))) => token.as_str(),
            Some((_, Value::Object(spec))) => required_string(spec, "token")?,
            _ => {
                return Err(RavelError::ScriptError(
                    "bearer auth requires a token string".to_string(),
                ));
            }
        };

        let token = call.expand(token);
        call.call
            .request_headers
            .set(AUTHORIZATION, format!("Bearer {}", token));
        Ok(())
    }
}
