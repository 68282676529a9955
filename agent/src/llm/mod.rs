use crate::Result;
use crate::tools::{ToolDefinition, ToolUse};
use async_trait::async_trait;
use std::hash::{DefaultHasher, Hash, Hasher};

mod anthropic;
mod openai;
pub use anthropic::Anthropic;
pub use openai::OpenAI;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ContentBlock {
    Text(String),
    ToolUse(ToolUse),
    ToolResult {
        tool_use_id: String,
        content: String,
    },
    /// Any other block kind returned by the api (server side search calls,
    /// search results, ...). Sent back unchanged.
    Opaque(serde_json::Value),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: Vec<ContentBlock>,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: vec![ContentBlock::Text(text.into())],
        }
    }

    pub fn assistant(content: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::Assistant,
            content,
        }
    }

    pub fn tool_results(results: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::User,
            content: results,
        }
    }

    pub fn tool_uses(&self) -> impl Iterator<Item = &ToolUse> {
        tool_uses(&self.content)
    }

    pub fn get_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.to_string().hash(&mut hasher);
        hasher.finish()
    }
}

impl std::fmt::Display for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "**{}**\n", self.role.as_str())?;
        for block in &self.content {
            match block {
                ContentBlock::Text(text) => writeln!(f, "{}\n", text)?,
                ContentBlock::ToolUse(tool_use) => writeln!(f, "{}", tool_use)?,
                ContentBlock::ToolResult {
                    tool_use_id,
                    content,
                } => writeln!(f, "- result for {}: {}\n", tool_use_id, content)?,
                ContentBlock::Opaque(value) => writeln!(
                    f,
                    "- [{}]\n",
                    value.get("type").and_then(|t| t.as_str()).unwrap_or("unknown")
                )?,
            }
        }
        Ok(())
    }
}

/// Concatenates every text block, in order, without separators.
pub fn join_text(content: &[ContentBlock]) -> String {
    content
        .iter()
        .filter_map(|block| match block {
            ContentBlock::Text(text) => Some(text.as_str()),
            _ => None,
        })
        .collect()
}

pub fn tool_uses(content: &[ContentBlock]) -> impl Iterator<Item = &ToolUse> {
    content.iter().filter_map(|block| match block {
        ContentBlock::ToolUse(tool_use) => Some(tool_use),
        _ => None,
    })
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StopReason {
    EndTurn,
    ToolUse,
    MaxTokens,
    StopSequence,
    PauseTurn,
    Other(String),
}

impl From<&str> for StopReason {
    fn from(reason: &str) -> Self {
        match reason {
            "end_turn" => StopReason::EndTurn,
            "tool_use" => StopReason::ToolUse,
            "max_tokens" => StopReason::MaxTokens,
            "stop_sequence" => StopReason::StopSequence,
            "pause_turn" => StopReason::PauseTurn,
            other => StopReason::Other(other.to_string()),
        }
    }
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StopReason::EndTurn => write!(f, "end_turn"),
            StopReason::ToolUse => write!(f, "tool_use"),
            StopReason::MaxTokens => write!(f, "max_tokens"),
            StopReason::StopSequence => write!(f, "stop_sequence"),
            StopReason::PauseTurn => write!(f, "pause_turn"),
            StopReason::Other(other) => write!(f, "{}", other),
        }
    }
}

pub struct CompletionRequest<'a> {
    pub system: Option<&'a str>,
    pub messages: &'a [Message],
    pub tools: &'a [ToolDefinition],
    pub max_tokens: u32,
}

#[derive(Clone, Debug)]
pub struct CompletionResponse {
    pub stop_reason: StopReason,
    pub content: Vec<ContentBlock>,
}

impl CompletionResponse {
    pub fn text(&self) -> String {
        join_text(&self.content)
    }
}

#[async_trait]
pub trait LLM {
    async fn completion<'a>(&self, request: CompletionRequest<'a>) -> Result<CompletionResponse>;
}
