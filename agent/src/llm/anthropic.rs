//! Messages api client.
//!
//! The web search tool is executed by the provider. Its calls and results come
//! back as extra content blocks which are kept opaque and echoed back as is.

use crate::llm::{self, ContentBlock, StopReason};
use crate::tools::{ToolDefinition, ToolUse, WEB_SEARCH_VERSION};
use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

const API_BASE: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";

pub struct Anthropic {
    model: String,
    api_key: String,
    api_base: String,
    client: Client,
}

impl Anthropic {
    pub fn new(model: String, api_key: String, api_base: Option<String>) -> Result<Arc<Self>> {
        if api_key.trim().is_empty() {
            return Err(Error::Config("anthropic api key is empty".to_string()));
        }

        Ok(Arc::new(Self {
            model,
            api_key,
            api_base: api_base
                .map(|base| base.trim_end_matches('/').to_string())
                .unwrap_or_else(|| API_BASE.to_string()),
            client: Client::new(),
        }))
    }
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool>,
}

#[derive(Serialize)]
struct WireMessage {
    role: &'static str,
    content: Vec<WireBlock>,
}

#[derive(Serialize)]
struct WireTool {
    #[serde(rename = "type")]
    kind: &'static str,
    name: &'static str,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
enum KnownBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
    },
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(untagged)]
enum WireBlock {
    Known(KnownBlock),
    Opaque(Value),
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<WireBlock>,
    stop_reason: Option<String>,
}

impl From<&ContentBlock> for WireBlock {
    fn from(block: &ContentBlock) -> Self {
        match block {
            ContentBlock::Text(text) => WireBlock::Known(KnownBlock::Text { text: text.clone() }),
            ContentBlock::ToolUse(call) => WireBlock::Known(KnownBlock::ToolUse {
                id: call.id.clone(),
                name: call.name.clone(),
                input: call.input.clone(),
            }),
            ContentBlock::ToolResult {
                tool_use_id,
                content,
            } => WireBlock::Known(KnownBlock::ToolResult {
                tool_use_id: tool_use_id.clone(),
                content: content.clone(),
            }),
            ContentBlock::Opaque(value) => WireBlock::Opaque(value.clone()),
        }
    }
}

impl From<WireBlock> for ContentBlock {
    fn from(block: WireBlock) -> Self {
        match block {
            WireBlock::Known(KnownBlock::Text { text }) => ContentBlock::Text(text),
            WireBlock::Known(KnownBlock::ToolUse { id, name, input }) => {
                ContentBlock::ToolUse(ToolUse { id, name, input })
            }
            WireBlock::Known(KnownBlock::ToolResult {
                tool_use_id,
                content,
            }) => ContentBlock::ToolResult {
                tool_use_id,
                content,
            },
            WireBlock::Opaque(value) => ContentBlock::Opaque(value),
        }
    }
}

impl From<&ToolDefinition> for WireTool {
    fn from(tool: &ToolDefinition) -> Self {
        match tool {
            ToolDefinition::WebSearch => WireTool {
                kind: WEB_SEARCH_VERSION,
                name: tool.name(),
            },
        }
    }
}

fn build_request<'a>(model: &'a str, request: &llm::CompletionRequest<'a>) -> MessagesRequest<'a> {
    MessagesRequest {
        model,
        max_tokens: request.max_tokens,
        system: request.system,
        messages: request
            .messages
            .iter()
            .map(|msg| WireMessage {
                role: msg.role.as_str(),
                content: msg.content.iter().map(WireBlock::from).collect(),
            })
            .collect(),
        tools: request.tools.iter().map(WireTool::from).collect(),
    }
}

fn parse_response(body: &str) -> Result<llm::CompletionResponse> {
    let response: MessagesResponse = serde_json::from_str(body)?;

    let stop_reason = response
        .stop_reason
        .as_deref()
        .map(StopReason::from)
        .ok_or(Error::LLMResponseError("stop_reason is missing".to_string()))?;

    Ok(llm::CompletionResponse {
        stop_reason,
        content: response.content.into_iter().map(ContentBlock::from).collect(),
    })
}

#[async_trait]
impl llm::LLM for Anthropic {
    async fn completion<'a>(
        &self,
        request: llm::CompletionRequest<'a>,
    ) -> Result<llm::CompletionResponse> {
        let body = build_request(&self.model, &request);

        debug!(
            model = %self.model,
            messages = body.messages.len(),
            "sending messages request"
        );

        let response = self
            .client
            .post(format!("{}/v1/messages", self.api_base))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            warn!(status = status.as_u16(), "messages request failed");
            return Err(Error::Api {
                status: status.as_u16(),
                body: text,
            });
        }

        parse_response(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{CompletionRequest, Message};
    use serde_json::json;

    #[test]
    fn test_new_rejects_empty_key() {
        assert!(matches!(
            Anthropic::new("m".to_string(), "  ".to_string(), None),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_build_request() -> Result<()> {
        let messages = vec![
            Message::user("question"),
            Message::assistant(vec![
                ContentBlock::Text("let me search".to_string()),
                ContentBlock::ToolUse(ToolUse {
                    id: "toolu_1".to_string(),
                    name: "web_search".to_string(),
                    input: json!({"query": "q"}),
                }),
                ContentBlock::Opaque(json!({"type": "web_search_tool_result", "tool_use_id": "srvtoolu_1", "content": []})),
            ]),
            Message::tool_results(vec![ContentBlock::ToolResult {
                tool_use_id: "toolu_1".to_string(),
                content: "Tool executed".to_string(),
            }]),
        ];
        let tools = vec![ToolDefinition::WebSearch];
        let request = CompletionRequest {
            system: Some("be precise"),
            messages: &messages,
            tools: &tools,
            max_tokens: 4000,
        };

        let body = serde_json::to_value(build_request("claude-test", &request))?;

        assert_eq!(body["model"], "claude-test");
        assert_eq!(body["max_tokens"], 4000);
        assert_eq!(body["system"], "be precise");
        assert_eq!(
            body["tools"],
            json!([{"type": "web_search_20250305", "name": "web_search"}])
        );
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(
            body["messages"][0]["content"],
            json!([{"type": "text", "text": "question"}])
        );
        assert_eq!(body["messages"][1]["role"], "assistant");
        assert_eq!(body["messages"][1]["content"][1]["type"], "tool_use");
        assert_eq!(body["messages"][1]["content"][1]["input"]["query"], "q");
        assert_eq!(
            body["messages"][1]["content"][2]["type"],
            "web_search_tool_result"
        );
        assert_eq!(
            body["messages"][2]["content"][0],
            json!({"type": "tool_result", "tool_use_id": "toolu_1", "content": "Tool executed"})
        );
        Ok(())
    }

    #[test]
    fn test_build_request_without_system_or_tools() -> Result<()> {
        let messages = vec![Message::user("q")];
        let request = CompletionRequest {
            system: None,
            messages: &messages,
            tools: &[],
            max_tokens: 10,
        };
        let body = serde_json::to_value(build_request("m", &request))?;
        assert!(body.get("system").is_none());
        assert!(body.get("tools").is_none());
        Ok(())
    }

    #[test]
    fn test_parse_response_tool_use() -> Result<()> {
        let body = json!({
            "id": "msg_1",
            "content": [
                {"type": "text", "text": "Searching."},
                {"type": "server_tool_use", "id": "srvtoolu_1", "name": "web_search", "input": {"query": "x"}},
                {"type": "tool_use", "id": "toolu_1", "name": "web_search", "input": {"query": "moocs"}}
            ],
            "stop_reason": "tool_use"
        })
        .to_string();

        let response = parse_response(&body)?;
        assert_eq!(response.stop_reason, StopReason::ToolUse);
        assert_eq!(response.content.len(), 3);
        assert!(matches!(&response.content[1], ContentBlock::Opaque(v) if v["type"] == "server_tool_use"));
        assert!(matches!(&response.content[2], ContentBlock::ToolUse(call) if call.id == "toolu_1"));
        assert_eq!(response.text(), "Searching.");
        Ok(())
    }

    #[test]
    fn test_parse_response_text_with_citations() -> Result<()> {
        let body = json!({
            "content": [
                {"type": "text", "text": "Part A. ", "citations": [{"url": "https://example.org"}]},
                {"type": "text", "text": "Part B."}
            ],
            "stop_reason": "end_turn"
        })
        .to_string();

        let response = parse_response(&body)?;
        assert_eq!(response.stop_reason, StopReason::EndTurn);
        assert_eq!(response.text(), "Part A. Part B.");
        Ok(())
    }

    #[test]
    fn test_parse_response_missing_stop_reason() {
        let body = json!({"content": []}).to_string();
        assert!(matches!(
            parse_response(&body),
            Err(Error::LLMResponseError(_))
        ));
    }

    #[test]
    fn test_parse_response_malformed() {
        assert!(matches!(parse_response("not json"), Err(Error::JsonError(_))));
    }
}
