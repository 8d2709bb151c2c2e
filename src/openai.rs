//! OpenAI chat-completion and embedding clients.
//!
//! - **[`OpenAiChatModel`]** implements [`LanguageModel`] with a forced
//!   function call on `POST /chat/completions`: the schema is offered as the
//!   only tool and `tool_choice` names it, which every tool-capable chat
//!   model (including `gpt-4-1106-preview`) accepts.
//! - **[`OpenAiEmbedder`]** implements [`Embedder`] using `POST /embeddings`.
//!
//! # Retry Strategy
//!
//! Both clients share one request loop:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors and timeouts → retry; a final timeout is returned as
//!   [`Timeout`] so callers can tell it apart from other failures
//! - Backoff: 1s, 2s, 4s, ... (capped at 2^5)
//!
//! `max_retries` defaults to 0, so a search request makes at most one
//! attempt per external call unless configured otherwise.

use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use product_search_core::embedding::Embedder;
use product_search_core::extract::{LanguageModel, StructuredOutputRequest};
use product_search_core::Timeout;
use serde_json::{json, Value};

use crate::config::{EmbeddingConfig, LlmConfig};

/// Shared HTTP plumbing for the OpenAI REST API.
struct OpenAiHttp {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    max_retries: u32,
}

impl OpenAiHttp {
    fn new(base_url: &str, api_key: &str, timeout_secs: u64, max_retries: u32) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            max_retries,
        })
    }

    /// POST `body` to `{base_url}/{path}` with retry/backoff.
    async fn post(&self, path: &str, body: &Value) -> Result<Value> {
        let url = format!("{}/{}", self.base_url, path);
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tracing::debug!(attempt, ?delay, url = %url, "retrying OpenAI request");
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        return response
                            .json()
                            .await
                            .map_err(|e| transport_error("OpenAI", e, "invalid JSON in OpenAI response"));
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    if status.as_u16() == 429 || status.is_server_error() {
                        last_err = Some(anyhow!("OpenAI API error {}: {}", status, body_text));
                        continue;
                    }

                    bail!("OpenAI API error {}: {}", status, body_text);
                }
                Err(e) => {
                    last_err = Some(transport_error("OpenAI", e, "OpenAI request failed"));
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow!("OpenAI request failed after retries")))
    }
}

/// Wrap a reqwest failure, marking client timeouts with [`Timeout`].
pub(crate) fn transport_error(
    service: &'static str,
    err: reqwest::Error,
    context: &'static str,
) -> anyhow::Error {
    if err.is_timeout() {
        anyhow::Error::new(Timeout::caused_by(service, err))
    } else {
        anyhow::Error::new(err).context(context)
    }
}

// ============ Chat model ============

/// Chat model whose structured output comes back as function-call arguments.
pub struct OpenAiChatModel {
    http: OpenAiHttp,
    model: String,
    temperature: f32,
}

impl OpenAiChatModel {
    pub fn new(config: &LlmConfig, api_key: &str) -> Result<Self> {
        Ok(Self {
            http: OpenAiHttp::new(
                &config.base_url,
                api_key,
                config.timeout_secs,
                config.max_retries,
            )?,
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }
}

/// Build the `POST /chat/completions` request body.
///
/// The schema becomes the parameters of a single function and `tool_choice`
/// forces the model to call it.
pub fn chat_request_body(
    model: &str,
    temperature: f32,
    request: &StructuredOutputRequest<'_>,
) -> Value {
    json!({
        "model": model,
        "temperature": temperature,
        "messages": [
            { "role": "system", "content": request.system_prompt },
            { "role": "user", "content": request.user_message }
        ],
        "tools": [{
            "type": "function",
            "function": {
                "name": request.schema_name,
                "description": "Record the structured product search query.",
                "parameters": request.schema
            }
        }],
        "tool_choice": {
            "type": "function",
            "function": { "name": request.schema_name }
        }
    })
}

/// Pull the structured answer out of a chat-completion response.
///
/// The first choice must call `function_name`; its `arguments` string is
/// parsed as JSON. A refusal, a truncated answer, or a plain-text reply is
/// an error.
pub fn parse_chat_response(json: &Value, function_name: &str) -> Result<Value> {
    let choice = json
        .get("choices")
        .and_then(|c| c.get(0))
        .ok_or_else(|| anyhow!("Invalid OpenAI response: missing choices"))?;
    let message = choice
        .get("message")
        .ok_or_else(|| anyhow!("Invalid OpenAI response: missing message"))?;

    if let Some(refusal) = message.get("refusal").and_then(Value::as_str) {
        bail!("model refused: {}", refusal);
    }
    if choice.get("finish_reason").and_then(Value::as_str) == Some("length") {
        bail!("model output was truncated");
    }

    let call = message
        .get("tool_calls")
        .and_then(Value::as_array)
        .and_then(|calls| {
            calls.iter().find(|c| {
                c.pointer("/function/name").and_then(Value::as_str) == Some(function_name)
            })
        })
        .ok_or_else(|| anyhow!("model did not call {}", function_name))?;

    let arguments = call
        .pointer("/function/arguments")
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow!("Invalid OpenAI response: missing function arguments"))?;

    serde_json::from_str(arguments).context("function arguments are not valid JSON")
}

#[async_trait]
impl LanguageModel for OpenAiChatModel {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn structured_output(&self, request: &StructuredOutputRequest<'_>) -> Result<Value> {
        let body = chat_request_body(&self.model, self.temperature, request);
        let json = self.http.post("chat/completions", &body).await?;
        parse_chat_response(&json, request.schema_name)
    }
}

// ============ Embeddings ============

/// Embedding client for `POST /embeddings`.
pub struct OpenAiEmbedder {
    http: OpenAiHttp,
    model: String,
}

impl OpenAiEmbedder {
    pub fn new(config: &EmbeddingConfig, api_key: &str) -> Result<Self> {
        Ok(Self {
            http: OpenAiHttp::new(
                &config.base_url,
                api_key,
                config.timeout_secs,
                config.max_retries,
            )?,
            model: config.model.clone(),
        })
    }
}

/// Parse the embeddings API response, returning vectors in input order.
pub fn parse_embedding_response(json: &Value) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| anyhow!("Invalid OpenAI response: missing data array"))?;

    let mut indexed = Vec::with_capacity(data.len());
    for (pos, item) in data.iter().enumerate() {
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| anyhow!("Invalid OpenAI response: missing embedding"))?;
        let index = item
            .get("index")
            .and_then(Value::as_u64)
            .map_or(pos, |i| i as usize);

        let vec = embedding
            .iter()
            .map(|v| {
                v.as_f64()
                    .map(|f| f as f32)
                    .ok_or_else(|| anyhow!("Invalid OpenAI response: non-numeric embedding value"))
            })
            .collect::<Result<Vec<f32>>>()?;

        indexed.push((index, vec));
    }

    indexed.sort_by_key(|(i, _)| *i);
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let body = json!({
            "model": self.model,
            "input": [text],
        });
        let json = self.http.post("embeddings", &body).await?;
        parse_embedding_response(&json)?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("Empty embedding response"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call_response(name: &str, arguments: &str) -> Value {
        json!({
            "choices": [{
                "finish_reason": "stop",
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {"name": name, "arguments": arguments}
                    }]
                }
            }]
        })
    }

    #[test]
    fn test_chat_body_forces_function_call_for_default_model() {
        let schema = json!({"type": "object"});
        let req = StructuredOutputRequest {
            system_prompt: "sys",
            user_message: "ไขควง",
            schema_name: "product_search_query",
            schema: &schema,
        };
        let model = LlmConfig::default().model;
        assert_eq!(model, "gpt-4-1106-preview");

        let body = chat_request_body(&model, 0.0, &req);
        assert_eq!(body["model"], "gpt-4-1106-preview");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "ไขควง");
        // json_schema response_format is rejected by pre-4o models.
        assert!(body.get("response_format").is_none());
        assert_eq!(body["tools"][0]["type"], "function");
        assert_eq!(body["tools"][0]["function"]["name"], "product_search_query");
        assert_eq!(body["tools"][0]["function"]["parameters"], schema);
        assert_eq!(
            body["tool_choice"],
            json!({"type": "function", "function": {"name": "product_search_query"}})
        );
    }

    #[test]
    fn test_parse_chat_response() {
        let resp = call_response(
            "product_search_query",
            "{\"product_category\": \"hand tools\", \"specs\": {\"color\": \"red\"}}",
        );
        let out = parse_chat_response(&resp, "product_search_query").unwrap();
        assert_eq!(out["product_category"], "hand tools");
        assert_eq!(out["specs"]["color"], "red");
    }

    #[test]
    fn test_parse_chat_response_errors() {
        let name = "product_search_query";
        assert!(parse_chat_response(&json!({}), name).is_err());
        assert!(parse_chat_response(&json!({"choices": []}), name).is_err());

        let refusal = json!({"choices": [{"message": {"refusal": "no", "content": null}}]});
        assert!(parse_chat_response(&refusal, name)
            .unwrap_err()
            .to_string()
            .contains("refused"));

        let mut truncated = call_response(name, "{\"prod");
        truncated["choices"][0]["finish_reason"] = json!("length");
        assert!(parse_chat_response(&truncated, name).is_err());

        let prose = json!({"choices": [{"message": {"content": "hand tools"}}]});
        assert!(parse_chat_response(&prose, name)
            .unwrap_err()
            .to_string()
            .contains("did not call"));

        let other = call_response("something_else", "{}");
        assert!(parse_chat_response(&other, name).is_err());

        let bad_args = call_response(name, "hand tools");
        assert!(parse_chat_response(&bad_args, name).is_err());
    }

    #[test]
    fn test_parse_embedding_response_orders_by_index() {
        let resp = json!({
            "data": [
                {"index": 1, "embedding": [0.5, 0.5]},
                {"index": 0, "embedding": [1.0, 0.0]}
            ]
        });
        let vecs = parse_embedding_response(&resp).unwrap();
        assert_eq!(vecs, vec![vec![1.0, 0.0], vec![0.5, 0.5]]);
    }

    #[test]
    fn test_parse_embedding_response_rejects_garbage() {
        assert!(parse_embedding_response(&json!({})).is_err());
        assert!(parse_embedding_response(&json!({"data": [{"embedding": ["x"]}]})).is_err());
    }
}
