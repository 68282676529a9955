use crate::callbacks::{self, Progress};
use crate::llm::{self, Message, StopReason};
use crate::tools::{self, ToolDefinition, ToolUse};
use crate::{Error, Result};
use std::sync::Arc;
use tracing::{debug, info, warn};

type Callback = Box<dyn callbacks::Callback + Send>;

const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Bounded tool use loop over a single llm.
///
/// Tools are hosted by the provider, so every tool call is answered with a
/// fixed placeholder result before the next request is sent.
pub struct Agent {
    llm: Arc<dyn llm::LLM + Send + Sync>,
    system_prompt: Option<String>,
    tools: Vec<ToolDefinition>,
    callbacks: Vec<Callback>,
    max_tokens: u32,
    max_iterations: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The model stopped on its own; `text` joins every text block of the
    /// final response.
    Completed { text: String },
    /// The iteration cap ran out while the model still wanted tools.
    Exhausted,
}

#[derive(Debug, Clone)]
pub struct Run {
    pub outcome: Outcome,
    pub messages: Vec<Message>,
    /// Every tool call the model made, in call order.
    pub tool_uses: Vec<ToolUse>,
    /// Number of requests sent.
    pub iterations: usize,
}

impl Agent {
    fn notify(&mut self, messages: &[Message]) {
        for callback in &mut self.callbacks {
            if let Err(err) = callback.call(messages) {
                warn!(%err, "callback failed");
            }
        }
    }

    pub async fn run(
        &mut self,
        mut messages: Vec<Message>,
        progress: &mut dyn Progress,
    ) -> Result<Run> {
        let mut tool_uses = Vec::new();

        for iteration in 1..=self.max_iterations {
            progress.report(
                &format!("Iteration {}/{}...", iteration, self.max_iterations),
                iteration as f32 / self.max_iterations as f32,
            );

            let next = self
                .llm
                .completion(llm::CompletionRequest {
                    system: self.system_prompt.as_deref(),
                    messages: &messages,
                    tools: &self.tools,
                    max_tokens: self.max_tokens,
                })
                .await?;

            debug!(
                iteration,
                stop_reason = %next.stop_reason,
                blocks = next.content.len(),
                "completion received"
            );

            match &next.stop_reason {
                StopReason::EndTurn => {
                    let text = next.text();
                    messages.push(Message::assistant(next.content));
                    self.notify(&messages);

                    info!(iteration, tool_uses = tool_uses.len(), "agent completed");
                    return Ok(Run {
                        outcome: Outcome::Completed { text },
                        messages,
                        tool_uses,
                        iterations: iteration,
                    });
                }
                StopReason::ToolUse => {
                    let calls = llm::tool_uses(&next.content).cloned().collect::<Vec<_>>();
                    if calls.is_empty() {
                        return Err(Error::LLMResponseError(
                            "stop reason is tool_use but no tool_use block was returned"
                                .to_string(),
                        ));
                    }

                    let results = calls
                        .iter()
                        .map(|call| call.placeholder_result(tools::PLACEHOLDER_RESULT))
                        .collect();

                    for call in &calls {
                        debug!(tool = %call.name, id = %call.id, "tool requested");
                    }

                    messages.push(Message::assistant(next.content));
                    messages.push(Message::tool_results(results));
                    tool_uses.extend(calls);
                    self.notify(&messages);
                }
                other => return Err(Error::UnexpectedStopReason(other.to_string())),
            }
        }

        warn!(
            max_iterations = self.max_iterations,
            "iteration cap reached before the model finished"
        );

        Ok(Run {
            outcome: Outcome::Exhausted,
            messages,
            tool_uses,
            iterations: self.max_iterations,
        })
    }
}

pub struct AgentBuilder {
    llm: Option<Arc<dyn llm::LLM + Send + Sync>>,
    system_prompt: Option<String>,
    tools: Vec<ToolDefinition>,
    callbacks: Vec<Callback>,
    max_tokens: u32,
    max_iterations: Option<usize>,
}

impl AgentBuilder {
    pub fn new() -> Self {
        Self {
            llm: None,
            system_prompt: None,
            tools: Vec::new(),
            callbacks: Vec::new(),
            max_tokens: DEFAULT_MAX_TOKENS,
            max_iterations: None,
        }
    }

    pub fn llm(mut self, llm: Arc<dyn llm::LLM + Send + Sync>) -> Self {
        self.llm = Some(llm);
        self
    }

    pub fn system_prompt(mut self, prompt: String) -> Self {
        self.system_prompt = Some(prompt);
        self
    }

    pub fn tool(mut self, tool: ToolDefinition) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn llm_websearch(self) -> Self {
        self.tool(ToolDefinition::WebSearch)
    }

    pub fn callback(mut self, callback: Callback) -> Self {
        self.callbacks.push(callback);
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = Some(max_iterations);
        self
    }

    pub fn build(self) -> Result<Agent> {
        let max_iterations = self.max_iterations.ok_or(Error::MissingArg(
            "max_iterations is required for agent".to_string(),
        ))?;
        if max_iterations == 0 {
            return Err(Error::InvalidInput(
                "max_iterations must be at least 1".to_string(),
            ));
        }

        Ok(Agent {
            llm: self
                .llm
                .ok_or(Error::MissingArg("llm is required for agent".to_string()))?,
            system_prompt: self.system_prompt,
            tools: self.tools,
            callbacks: self.callbacks,
            max_tokens: self.max_tokens,
            max_iterations,
        })
    }
}

impl Default for AgentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use crate::callbacks::{Callback, NoProgress};
    use crate::llm::{CompletionRequest, CompletionResponse, ContentBlock, LLM, Message, StopReason};
    use crate::tools::{ToolDefinition, ToolUse};
    use crate::{AgentBuilder, Error, Outcome, Result};
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Replays scripted responses and records every request it receives.
    struct MockLLM {
        responses: Mutex<VecDeque<CompletionResponse>>,
        requests: Mutex<Vec<Vec<Message>>>,
    }

    impl MockLLM {
        fn new(responses: Vec<CompletionResponse>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn requests(&self) -> Vec<Vec<Message>> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl LLM for MockLLM {
        async fn completion<'a>(
            &self,
            request: CompletionRequest<'a>,
        ) -> Result<CompletionResponse> {
            assert_eq!(request.tools, &[ToolDefinition::WebSearch]);
            self.requests.lock().unwrap().push(request.messages.to_vec());
            Ok(self
                .responses
                .lock()
                .unwrap()
                .pop_front()
                .expect("unexpected request"))
        }
    }

    fn search(id: &str, query: &str) -> ContentBlock {
        ContentBlock::ToolUse(ToolUse {
            id: id.to_string(),
            name: "web_search".to_string(),
            input: json!({ "query": query }),
        })
    }

    fn tool_use(content: Vec<ContentBlock>) -> CompletionResponse {
        CompletionResponse {
            stop_reason: StopReason::ToolUse,
            content,
        }
    }

    fn end_turn(texts: &[&str]) -> CompletionResponse {
        CompletionResponse {
            stop_reason: StopReason::EndTurn,
            content: texts
                .iter()
                .map(|t| ContentBlock::Text(t.to_string()))
                .collect(),
        }
    }

    #[tokio::test]
    async fn test_agent() -> Result<()> {
        let llm = MockLLM::new(vec![
            tool_use(vec![
                ContentBlock::Text("searching".to_string()),
                search("a", "first"),
                search("b", "second"),
            ]),
            end_turn(&["Part A. ", "Part B."]),
        ]);

        let mut agent = AgentBuilder::new()
            .llm(llm.clone())
            .llm_websearch()
            .max_iterations(5)
            .build()?;

        let run = agent.run(vec![Message::user("do stuff")], &mut NoProgress).await?;

        assert_eq!(
            run.outcome,
            Outcome::Completed {
                text: "Part A. Part B.".to_string()
            }
        );
        assert_eq!(run.iterations, 2);
        assert_eq!(run.tool_uses.len(), 2);
        assert_eq!(run.messages.len(), 4);

        let requests = llm.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].len(), 1);

        // the second request must already answer both tool calls
        let answered = &requests[1][2];
        assert_eq!(
            answered.content,
            vec![
                ContentBlock::ToolResult {
                    tool_use_id: "a".to_string(),
                    content: "Tool executed".to_string(),
                },
                ContentBlock::ToolResult {
                    tool_use_id: "b".to_string(),
                    content: "Tool executed".to_string(),
                },
            ]
        );

        Ok(())
    }

    #[tokio::test]
    async fn test_agent_exhausts_cap() -> Result<()> {
        let llm = MockLLM::new(vec![
            tool_use(vec![search("a", "one")]),
            tool_use(vec![search("b", "two")]),
            tool_use(vec![search("c", "three")]),
        ]);

        let mut agent = AgentBuilder::new()
            .llm(llm.clone())
            .llm_websearch()
            .max_iterations(2)
            .build()?;

        let run = agent.run(vec![Message::user("q")], &mut NoProgress).await?;

        assert_eq!(run.outcome, Outcome::Exhausted);
        assert_eq!(run.iterations, 2);
        assert_eq!(llm.requests().len(), 2);
        assert_eq!(run.tool_uses.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_agent_unexpected_stop_reason() -> Result<()> {
        let llm = MockLLM::new(vec![CompletionResponse {
            stop_reason: StopReason::MaxTokens,
            content: vec![ContentBlock::Text("truncated".to_string())],
        }]);

        let mut agent = AgentBuilder::new()
            .llm(llm)
            .llm_websearch()
            .max_iterations(3)
            .build()?;

        let err = agent.run(vec![Message::user("q")], &mut NoProgress).await.unwrap_err();
        assert!(matches!(err, Error::UnexpectedStopReason(reason) if reason == "max_tokens"));
        Ok(())
    }

    #[tokio::test]
    async fn test_agent_tool_use_without_blocks() -> Result<()> {
        let llm = MockLLM::new(vec![tool_use(vec![ContentBlock::Text("hm".to_string())])]);

        let mut agent = AgentBuilder::new()
            .llm(llm)
            .llm_websearch()
            .max_iterations(3)
            .build()?;

        let err = agent.run(vec![Message::user("q")], &mut NoProgress).await.unwrap_err();
        assert!(matches!(err, Error::LLMResponseError(_)));
        Ok(())
    }

    #[tokio::test]
    async fn test_agent_reports_progress() -> Result<()> {
        let llm = MockLLM::new(vec![tool_use(vec![search("a", "one")]), end_turn(&["done"])]);

        let mut agent = AgentBuilder::new()
            .llm(llm)
            .llm_websearch()
            .max_iterations(4)
            .build()?;

        let mut reports = Vec::new();
        let mut sink = |label: &str, fraction: f32| reports.push((label.to_string(), fraction));
        agent.run(vec![Message::user("q")], &mut sink).await?;

        assert_eq!(
            reports,
            vec![
                ("Iteration 1/4...".to_string(), 0.25),
                ("Iteration 2/4...".to_string(), 0.5),
            ]
        );
        Ok(())
    }

    struct FailingCallback;

    impl Callback for FailingCallback {
        fn call(&mut self, _: &[Message]) -> Result<()> {
            Err(Error::IOError(std::io::Error::other("disk full")))
        }
    }

    #[tokio::test]
    async fn test_agent_ignores_callback_failures() -> Result<()> {
        let llm = MockLLM::new(vec![end_turn(&["ok"])]);

        let mut agent = AgentBuilder::new()
            .llm(llm)
            .llm_websearch()
            .max_iterations(1)
            .callback(Box::new(FailingCallback))
            .build()?;

        let run = agent.run(vec![Message::user("q")], &mut NoProgress).await?;
        assert_eq!(
            run.outcome,
            Outcome::Completed {
                text: "ok".to_string()
            }
        );
        Ok(())
    }

    #[test]
    fn test_builder_requires_positive_cap() {
        let llm = MockLLM::new(vec![]);
        assert!(matches!(
            AgentBuilder::new().llm(llm.clone()).max_iterations(0).build(),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            AgentBuilder::new().llm(llm).build(),
            Err(Error::MissingArg(_))
        ));
        assert!(matches!(
            AgentBuilder::new().max_iterations(1).build(),
            Err(Error::MissingArg(_))
        ));
    }
}
