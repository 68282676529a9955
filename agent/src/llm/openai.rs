use crate::llm::{self, ContentBlock, Role, StopReason};
use crate::tools::{ToolDefinition, ToolUse};
use crate::{Error, Result};
use async_openai::{
    Client,
    config::OpenAIConfig,
    types::{
        ChatCompletionMessageToolCall, ChatCompletionRequestAssistantMessageArgs,
        ChatCompletionRequestAssistantMessageContent, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessage, ChatCompletionRequestSystemMessageContent,
        ChatCompletionRequestToolMessage, ChatCompletionRequestToolMessageContent,
        ChatCompletionRequestUserMessage, ChatCompletionRequestUserMessageContent,
        ChatCompletionToolType, CreateChatCompletionRequestArgs, FinishReason, FunctionCall,
        WebSearchOptions,
    },
};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

pub struct OpenAI {
    model: String,
    client: Client<OpenAIConfig>,
}

impl OpenAI {
    pub fn new(model: String, api_key: String, api_base: Option<String>) -> Result<Arc<Self>> {
        if api_key.trim().is_empty() {
            return Err(Error::Config("openai api key is empty".to_string()));
        }

        let mut config = OpenAIConfig::new().with_api_key(api_key);
        if let Some(base) = api_base {
            config = config.with_api_base(base);
        }

        Ok(Arc::new(Self {
            model,
            client: Client::with_config(config),
        }))
    }
}

fn system_message(system: &str) -> ChatCompletionRequestMessage {
    ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage {
        content: ChatCompletionRequestSystemMessageContent::Text(system.to_string()),
        name: None,
    })
}

/// A user turn may carry several tool results, each of which becomes its own
/// tool message.
fn convert_message(msg: &llm::Message) -> Result<Vec<ChatCompletionRequestMessage>> {
    let text = llm::join_text(&msg.content);

    match msg.role {
        Role::User => {
            let mut converted = Vec::new();
            for block in &msg.content {
                if let ContentBlock::ToolResult {
                    tool_use_id,
                    content,
                } = block
                {
                    converted.push(ChatCompletionRequestMessage::Tool(
                        ChatCompletionRequestToolMessage {
                            content: ChatCompletionRequestToolMessageContent::Text(content.clone()),
                            tool_call_id: tool_use_id.clone(),
                        },
                    ));
                }
            }
            if !text.is_empty() || converted.is_empty() {
                converted.push(ChatCompletionRequestMessage::User(
                    ChatCompletionRequestUserMessage {
                        content: ChatCompletionRequestUserMessageContent::Text(text),
                        name: None,
                    },
                ));
            }
            Ok(converted)
        }
        Role::Assistant => {
            let tool_calls = msg
                .tool_uses()
                .map(|call| {
                    Ok(ChatCompletionMessageToolCall {
                        id: call.id.clone(),
                        r#type: ChatCompletionToolType::Function,
                        function: FunctionCall {
                            name: call.name.clone(),
                            arguments: serde_json::to_string(&call.input)?,
                        },
                    })
                })
                .collect::<Result<Vec<_>>>()?;

            let mut assistant = ChatCompletionRequestAssistantMessageArgs::default();
            assistant.content(ChatCompletionRequestAssistantMessageContent::Text(text));
            if !tool_calls.is_empty() {
                assistant.tool_calls(tool_calls);
            }

            Ok(vec![ChatCompletionRequestMessage::Assistant(
                assistant.build()?,
            )])
        }
    }
}

fn convert_finish_reason(reason: FinishReason) -> StopReason {
    match reason {
        FinishReason::Stop => StopReason::EndTurn,
        FinishReason::ToolCalls => StopReason::ToolUse,
        FinishReason::Length => StopReason::MaxTokens,
        FinishReason::ContentFilter => StopReason::Other("content_filter".to_string()),
        FinishReason::FunctionCall => StopReason::Other("function_call".to_string()),
    }
}

#[async_trait]
impl llm::LLM for OpenAI {
    async fn completion<'a>(
        &self,
        request: llm::CompletionRequest<'a>,
    ) -> Result<llm::CompletionResponse> {
        let mut messages = Vec::new();
        if let Some(system) = request.system {
            messages.push(system_message(system));
        }
        for msg in request.messages {
            messages.extend(convert_message(msg)?);
        }

        let mut completion = CreateChatCompletionRequestArgs::default();
        completion
            .model(&self.model)
            .max_completion_tokens(request.max_tokens)
            .messages(messages);

        if request.tools.contains(&ToolDefinition::WebSearch) {
            completion.web_search_options(WebSearchOptions::default());
        }

        let completion = completion.build()?;

        debug!(model = %self.model, "sending chat completion request");

        let res = self.client.chat().create(completion).await?;

        let choice = res
            .choices
            .into_iter()
            .next()
            .ok_or(Error::LLMResponseError("choices is empty".to_string()))?;

        let stop_reason = choice
            .finish_reason
            .map(convert_finish_reason)
            .ok_or(Error::LLMResponseError("finish_reason is missing".to_string()))?;

        let mut content = Vec::new();
        if let Some(text) = choice.message.content.filter(|text| !text.is_empty()) {
            content.push(ContentBlock::Text(text));
        }
        for call in choice.message.tool_calls.unwrap_or_default() {
            content.push(ContentBlock::ToolUse(ToolUse {
                id: call.id,
                name: call.function.name,
                input: serde_json::from_str(&call.function.arguments)?,
            }));
        }

        Ok(llm::CompletionResponse {
            stop_reason,
            content,
        })
    }
}
