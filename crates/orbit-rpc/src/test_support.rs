//! wiremock helpers that speak just enough JSON-RPC for client tests.

use std::time::Duration;

use serde_json::{Value, json};
use wiremock::{Request, Respond, ResponseTemplate};

use crate::protocol::{JsonRpcError, JsonRpcResponse, PROTOCOL_VERSION, RequestId};

enum Payload {
    Result(Value),
    Error(JsonRpcError),
}

/// Echoes each request id back with a canned result or error.
pub(crate) struct RpcResponder {
    payload: Payload,
    delay: Option<Duration>,
    reversed: bool,
}

impl RpcResponder {
    pub(crate) fn result(value: Value) -> Self {
        Self {
            payload: Payload::Result(value),
            delay: None,
            reversed: false,
        }
    }

    pub(crate) fn error(error: JsonRpcError) -> Self {
        Self {
            payload: Payload::Error(error),
            delay: None,
            reversed: false,
        }
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Answer batches in reverse order.
    pub(crate) fn reversed(mut self) -> Self {
        self.reversed = true;
        self
    }

    fn answer(&self, id: Option<RequestId>) -> JsonRpcResponse {
        match &self.payload {
            Payload::Result(value) => JsonRpcResponse::success(id, value.clone()),
            Payload::Error(error) => JsonRpcResponse::failure(id, error.clone()),
        }
    }
}

fn request_id(entry: &Value) -> Option<RequestId> {
    entry
        .get("id")
        .and_then(|id| serde_json::from_value(id.clone()).ok())
}

impl Respond for RpcResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: Value = serde_json::from_slice(&request.body).unwrap_or(Value::Null);
        let response = match body {
            Value::Array(entries) => {
                let mut answers: Vec<JsonRpcResponse> = entries
                    .iter()
                    .map(|entry| self.answer(request_id(entry)))
                    .collect();
                if self.reversed {
                    answers.reverse();
                }
                serde_json::to_value(answers).unwrap_or(Value::Null)
            }
            single => serde_json::to_value(self.answer(request_id(&single))).unwrap_or(Value::Null),
        };

        let template = ResponseTemplate::new(200).set_body_json(response);
        match self.delay {
            Some(delay) => template.set_delay(delay),
            None => template,
        }
    }
}

pub(crate) fn init_result(server_name: &str) -> Value {
    json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": {"tools": {"listChanged": false}},
        "serverInfo": {"name": server_name, "version": "1.0.0"}
    })
}

pub(crate) fn tools_result(names: &[&str]) -> Value {
    let tools: Vec<Value> = names
        .iter()
        .map(|name| {
            json!({
                "name": name,
                "description": format!("{name} tool"),
                "inputSchema": {"type": "object", "properties": {}}
            })
        })
        .collect();
    json!({ "tools": tools })
}
