use crate::Result;
use crate::llm::Message;

mod logger;
pub use logger::MessageLogger;

/// Observes the conversation after every iteration of the agent loop.
///
/// Failures are logged by the agent and never stop the loop.
pub trait Callback {
    fn call(&mut self, messages: &[Message]) -> Result<()>;
}

/// Receives a stage label and a completion fraction in `[0, 1]`.
pub trait Progress {
    fn report(&mut self, label: &str, fraction: f32);
}

impl<F> Progress for F
where
    F: FnMut(&str, f32),
{
    fn report(&mut self, label: &str, fraction: f32) {
        self(label, fraction)
    }
}

/// Progress sink that drops every report.
pub struct NoProgress;

impl Progress for NoProgress {
    fn report(&mut self, _: &str, _: f32) {}
}
