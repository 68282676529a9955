use crate::Result;
use crate::llm::ContentBlock;
use serde::de::DeserializeOwned;

mod web_search;
pub use web_search::{WEB_SEARCH_TOOL, WEB_SEARCH_VERSION, WebSearchArgs};

pub const PLACEHOLDER_RESULT: &str = "Tool executed";

/// Tool capabilities declared with every request.
///
/// Only provider hosted tools are supported: the provider runs them and
/// returns their output inside its own response, so nothing is executed here.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ToolDefinition {
    WebSearch,
}

impl ToolDefinition {
    pub fn name(&self) -> &'static str {
        match self {
            ToolDefinition::WebSearch => WEB_SEARCH_TOOL,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ToolUse {
    pub id: String,
    pub name: String,
    pub input: serde_json::Value,
}

impl ToolUse {
    pub fn args<O: DeserializeOwned>(&self) -> Result<O> {
        let args = serde_json::from_value(self.input.clone())?;
        Ok(args)
    }

    pub fn is_web_search(&self) -> bool {
        self.name == WEB_SEARCH_TOOL
    }

    /// Answers this call with a fixed result, keeping the id pairing intact.
    pub fn placeholder_result(&self, content: &str) -> ContentBlock {
        ContentBlock::ToolResult {
            tool_use_id: self.id.clone(),
            content: content.to_string(),
        }
    }
}

impl std::fmt::Display for ToolUse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "- {} ({})\n\t- `{}`\n", self.name, self.id, self.input)
    }
}
