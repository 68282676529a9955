use agent::callbacks::{MessageLogger, NoProgress, Progress};
use agent::llm::{self, Message};
use agent::tools::{ToolDefinition, ToolUse, WebSearchArgs};
use agent::{AgentBuilder, Outcome};
use agent::{Error, Result};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

const QUICK_SYSTEM_PROMPT: &str = include_str!("prompts/quick_system.md");
const REVIEW_SYSTEM_PROMPT: &str = include_str!("prompts/review_system.md");
const REVIEW_INSTRUCTIONS: &str = include_str!("prompts/review_instructions.md");

const QUICK_MAX_TOKENS: u32 = 4000;
const REVIEW_MAX_TOKENS: u32 = 16000;

pub const DEFAULT_TIME_FRAME: &str = "last 3 years";
pub const DEFAULT_MAX_ITERATIONS: usize = 8;
pub const INCOMPLETE_FINDINGS: &str = "Search incomplete - max iterations reached";

#[derive(Debug, Clone, PartialEq)]
pub struct ReviewRequest {
    pub question: String,
    pub focus: Option<Vec<String>>,
    pub time_frame: String,
    pub max_iterations: usize,
}

impl ReviewRequest {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            focus: None,
            time_frame: DEFAULT_TIME_FRAME.to_string(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    fn prompt(&self) -> String {
        let mut prompt = format!("Research Question: {}\n", self.question);
        if let Some(focus) = self.focus.as_ref().filter(|focus| !focus.is_empty()) {
            prompt.push_str(&format!("Focus Areas: {}\n", focus.join(", ")));
        }
        prompt.push_str(&format!("Time Frame: {}\n\n", self.time_frame));
        prompt.push_str(REVIEW_INSTRUCTIONS);
        prompt
    }
}

/// Trims focus topics and drops blank ones; no topics at all means no focus.
pub fn parse_focus<'a>(topics: impl IntoIterator<Item = &'a str>) -> Option<Vec<String>> {
    let topics = topics
        .into_iter()
        .map(str::trim)
        .filter(|topic| !topic.is_empty())
        .map(str::to_string)
        .collect::<Vec<_>>();

    (!topics.is_empty()).then_some(topics)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchMetadata {
    pub start_time: DateTime<Local>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Local>>,
    pub research_question: String,
    pub searches_performed: Vec<String>,
    pub tool_uses: usize,
    /// Only set when the model finished on its own.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_iterations: Option<usize>,
}

impl SearchMetadata {
    fn start(question: &str) -> Self {
        Self {
            start_time: Local::now(),
            end_time: None,
            research_question: question.to_string(),
            searches_performed: Vec::new(),
            tool_uses: 0,
            total_iterations: None,
        }
    }

    fn record(&mut self, calls: &[ToolUse]) {
        for call in calls {
            self.tool_uses += 1;
            if call.is_web_search() {
                let query = match call.args::<WebSearchArgs>() {
                    Ok(args) => args.query,
                    Err(err) => {
                        warn!(%err, id = %call.id, "web search call without a query");
                        call.input.to_string()
                    }
                };
                self.searches_performed.push(query);
            }
        }
    }

    fn finish(&mut self, total_iterations: Option<usize>) {
        self.end_time = Some(Local::now());
        self.total_iterations = total_iterations;
    }
}

#[derive(Debug, Clone)]
pub struct Review {
    pub findings: String,
    pub metadata: SearchMetadata,
}

fn validate_question(question: &str) -> Result<()> {
    if question.trim().is_empty() {
        return Err(Error::InvalidInput("question must not be empty".to_string()));
    }
    Ok(())
}

/// Runs academic searches against an llm that has web search enabled.
pub struct Searcher {
    llm: Arc<dyn llm::LLM + Send + Sync>,
    transcript: Option<PathBuf>,
}

impl Searcher {
    pub fn new(llm: Arc<dyn llm::LLM + Send + Sync>) -> Self {
        Self {
            llm,
            transcript: None,
        }
    }

    /// Appends the conversation of every review to `path` as markdown.
    pub fn with_transcript(mut self, path: PathBuf) -> Self {
        self.transcript = Some(path);
        self
    }

    /// One request, no loop. The stop reason is not inspected.
    pub async fn simple_query(
        &self,
        question: &str,
        progress: Option<&mut dyn Progress>,
    ) -> Result<String> {
        validate_question(question)?;

        let mut silent = NoProgress;
        let progress: &mut dyn Progress = match progress {
            Some(progress) => progress,
            None => &mut silent,
        };

        progress.report("Searching...", 0.3);

        let messages = vec![Message::user(format!(
            "Search for and summarize: {}",
            question
        ))];
        let response = self
            .llm
            .completion(llm::CompletionRequest {
                system: Some(QUICK_SYSTEM_PROMPT.trim_end()),
                messages: &messages,
                tools: &[ToolDefinition::WebSearch],
                max_tokens: QUICK_MAX_TOKENS,
            })
            .await?;

        progress.report("Processing results...", 0.8);
        let text = response.text();
        progress.report("Complete!", 1.0);

        info!(chars = text.len(), "quick search finished");
        Ok(text)
    }

    pub async fn iterative_review(
        &self,
        request: &ReviewRequest,
        progress: Option<&mut dyn Progress>,
    ) -> Result<Review> {
        validate_question(&request.question)?;
        if request.max_iterations == 0 {
            return Err(Error::InvalidInput(
                "max iterations must be at least 1".to_string(),
            ));
        }

        let mut silent = NoProgress;
        let progress: &mut dyn Progress = match progress {
            Some(progress) => progress,
            None => &mut silent,
        };

        let mut metadata = SearchMetadata::start(&request.question);

        let mut builder = AgentBuilder::new()
            .system_prompt(REVIEW_SYSTEM_PROMPT.trim_end().to_string())
            .llm(self.llm.clone())
            .llm_websearch()
            .max_tokens(REVIEW_MAX_TOKENS)
            .max_iterations(request.max_iterations);

        if let Some(path) = &self.transcript {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            builder = builder.callback(MessageLogger::new(&request.question, file)?);
        }

        let mut agent = builder.build()?;
        let run = agent
            .run(vec![Message::user(request.prompt())], &mut *progress)
            .await?;

        metadata.record(&run.tool_uses);

        let findings = match run.outcome {
            Outcome::Completed { text } => {
                metadata.finish(Some(run.iterations));
                progress.report("Search completed!", 1.0);
                text
            }
            Outcome::Exhausted => {
                metadata.finish(None);
                INCOMPLETE_FINDINGS.to_string()
            }
        };

        info!(
            searches = metadata.searches_performed.len(),
            tool_uses = metadata.tool_uses,
            "review finished"
        );

        Ok(Review { findings, metadata })
    }
}
