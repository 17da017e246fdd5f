use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;

use super::traits::PortalResult;

/// How a portal expects requests to be authenticated
#[derive(Debug, Clone)]
pub(crate) enum Auth {
    Header { name: &'static str, value: String },
    Bearer(String),
    Basic { user: String, password: String },
}

#[derive(Debug, Error)]
pub(crate) enum CallError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("portal returned HTTP {status}")]
    Api { status: StatusCode, body: Value },
}

impl CallError {
    pub(crate) fn status(&self) -> Option<StatusCode> {
        match self {
            CallError::Api { status, .. } => Some(*status),
            CallError::Network(_) => None,
        }
    }

    /// Body to keep as the raw response of a failed call
    pub(crate) fn raw(&self) -> Value {
        match self {
            CallError::Api { status, body } => json!({ "status": status.as_u16(), "body": body }),
            CallError::Network(e) => json!({ "network_error": e.to_string() }),
        }
    }
}

/// JSON-over-HTTP plumbing shared by the portal clients
pub(crate) struct PortalHttp {
    client: Client,
    base_url: String,
    auth: Auth,
}

impl PortalHttp {
    pub(crate) fn new(client: Client, base_url: &str, auth: Auth) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth,
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let builder = self.client.request(method, url);
        match &self.auth {
            Auth::Header { name, value } => builder.header(*name, value),
            Auth::Bearer(token) => builder.bearer_auth(token),
            Auth::Basic { user, password } => builder.basic_auth(user, Some(password)),
        }
    }

    /// Send a request and return the parsed body of a 2xx response.
    ///
    /// Empty bodies come back as `Value::Null`; non-JSON bodies as a string.
    pub(crate) async fn call(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Value, CallError> {
        debug!(%method, path, "Calling portal API");

        let mut builder = self.request(method, path);
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let text = response.text().await?;
        let body = parse_body(&text);

        if !status.is_success() {
            return Err(CallError::Api { status, body });
        }
        Ok(body)
    }
}

fn parse_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

/// Portals return ids as strings or numbers
pub(crate) fn json_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub(crate) fn json_count(value: &Value) -> i64 {
    value
        .as_i64()
        .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
        .unwrap_or(0)
}

/// Turn a failed call into a failed [`PortalResult`] using the portal's own
/// error vocabulary when the body carries one.
pub(crate) fn failure(err: CallError, message_of: fn(&Value) -> Option<String>) -> PortalResult {
    let message = match &err {
        CallError::Api { status, body } => match message_of(body) {
            Some(message) => format!("{} ({})", message, status.as_u16()),
            None => err.to_string(),
        },
        CallError::Network(_) => err.to_string(),
    };
    PortalResult::failed(message, err.raw())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_accept_strings_and_numbers() {
        assert_eq!(json_id(&json!("AV-1")), Some("AV-1".to_string()));
        assert_eq!(json_id(&json!(99812)), Some("99812".to_string()));
        assert_eq!(json_id(&json!("")), None);
        assert_eq!(json_id(&Value::Null), None);
    }

    #[test]
    fn non_json_bodies_are_kept_as_text() {
        assert_eq!(parse_body(""), Value::Null);
        assert_eq!(parse_body("{\"ok\":true}"), json!({ "ok": true }));
        assert_eq!(parse_body("Bad Gateway"), json!("Bad Gateway"));
    }

    #[test]
    fn failure_uses_portal_message() {
        let err = CallError::Api {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            body: json!({ "mensaje": "precio inválido" }),
        };
        let result = failure(err, |b| b["mensaje"].as_str().map(str::to_string));
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("precio inválido (422)"));
        assert_eq!(result.raw_response["status"], 422);
    }
}
