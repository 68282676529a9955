use async_openai::error::OpenAIError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Json error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Openai error: {0}")]
    OpenaiError(#[from] OpenAIError),

    #[error("Http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Api returned status {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Invalid response from llm: {0}")]
    LLMResponseError(String),

    #[error("Unexpected stop reason: {0}")]
    UnexpectedStopReason(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Missing arg: {0}")]
    MissingArg(String),

    #[error("IO Error: {0}")]
    IOError(#[from] std::io::Error),
}
