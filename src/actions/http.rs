//! `http.request`: blocking HTTP call.

use super::{output, Action, ActionOutput};
use crate::context::Context;
use crate::error::Error;
use crate::filters::text_of;
use crate::step::Step;
use reqwest::blocking::Client;
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::time::Duration;

/// Parameters of an HTTP request.
#[derive(Debug, Clone, Deserialize)]
pub struct RequestConfig {
    /// URL to request
    pub url: String,

    /// HTTP method (default: GET)
    #[serde(default = "default_method")]
    pub method: String,

    /// Headers, as a mapping or as `"Name: value"` lines
    #[serde(default)]
    pub headers: Value,

    /// Query parameters appended to the URL
    #[serde(default)]
    pub query: Map<String, Value>,

    /// Text is sent as-is; sequences and mappings are sent as JSON
    #[serde(default)]
    pub body: Option<Value>,

    /// Timeout in seconds; 0 means none
    #[serde(default)]
    pub timeout: u64,
}

fn default_method() -> String {
    "GET".to_string()
}

impl RequestConfig {
    fn from_params(params: Map<String, Value>) -> crate::Result<Self> {
        match params.get("url") {
            None | Some(Value::Null) => {
                return Err(Error::validation("Parameter 'url' is required."))
            }
            Some(Value::String(url)) if url.trim().is_empty() => {
                return Err(Error::validation("Parameter 'url' is required."))
            }
            _ => {}
        }
        serde_json::from_value(Value::Object(params))
            .map_err(|e| Error::validation(format!("Invalid http.request parameters: {e}")))
    }

    fn method(&self) -> crate::Result<Method> {
        Method::from_bytes(self.method.trim().to_ascii_uppercase().as_bytes())
            .map_err(|_| Error::validation(format!("Invalid HTTP method '{}'.", self.method)))
    }

    fn header_pairs(&self) -> Vec<(String, String)> {
        match &self.headers {
            Value::Object(map) => map
                .iter()
                .map(|(name, value)| (name.clone(), text_of(value)))
                .collect(),
            Value::Array(lines) => lines
                .iter()
                .filter_map(|line| {
                    let line = text_of(line);
                    let (name, value) = line.split_once(':')?;
                    Some((name.trim().to_string(), value.trim().to_string()))
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    fn query_pairs(&self) -> Vec<(String, String)> {
        self.query
            .iter()
            .map(|(name, value)| (name.clone(), text_of(value)))
            .collect()
    }
}

/// Sends an HTTP request and returns `code`, `body` and, when the body is
/// JSON, `decoded`.
///
/// A transport failure (connection refused, timeout) is reported as
/// `success: false` with `error`; any HTTP status counts as a response.
#[derive(Debug, Default, Clone, Copy)]
pub struct RequestAction;

impl Action for RequestAction {
    fn execute(
        &self,
        params: Map<String, Value>,
        ctx: &mut Context,
        _steps: &[Step],
    ) -> anyhow::Result<ActionOutput> {
        let config = RequestConfig::from_params(params)?;
        let method = config.method()?;

        let client = Client::builder().timeout(None::<Duration>).build()?;
        let mut request = client.request(method, &config.url);

        let query = config.query_pairs();
        if !query.is_empty() {
            request = request.query(&query);
        }
        for (name, value) in config.header_pairs() {
            request = request.header(name, value);
        }
        match &config.body {
            None | Some(Value::Null) => {}
            Some(Value::String(text)) => request = request.body(text.clone()),
            Some(body @ (Value::Array(_) | Value::Object(_))) => request = request.json(body),
            Some(other) => request = request.body(text_of(other)),
        }
        if config.timeout > 0 {
            request = request.timeout(Duration::from_secs(config.timeout));
        }

        let response = match request.send().and_then(|r| {
            let code = r.status().as_u16();
            r.text().map(|text| (code, text))
        }) {
            Ok(response) => response,
            Err(e) => {
                let code = e.status().map(|s| s.as_u16()).unwrap_or(0);
                ctx.logger().error(
                    "HTTP request failed, {error}",
                    json!({ "url": config.url, "error": e.to_string() }),
                );
                return Ok(output(json!({
                    "success": false,
                    "code": code,
                    "error": e.to_string(),
                })));
            }
        };
        let (code, body) = response;

        let mut result = output(json!({ "success": true, "code": code, "body": body }));
        if let Ok(decoded) = serde_json::from_str::<Value>(&body) {
            ctx.logger()
                .debug("Read action result: {decoded}", json!({ "decoded": decoded }));
            result.insert("decoded".to_string(), decoded);
        }

        ctx.logger().info(
            "HTTP request completed",
            json!({ "url": config.url, "code": code }),
        );
        Ok(result)
    }
}
