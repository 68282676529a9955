use crate::Result;
use crate::callbacks::Callback;
use crate::llm::Message;
use std::io::Write;

/// Writes the conversation as a markdown transcript, one section per step.
pub struct MessageLogger<W: Write + Send> {
    last_hashes: Vec<u64>,
    writer: W,
    step: u32,
}

impl<W: Write + Send> MessageLogger<W> {
    pub fn new(name: &str, mut writer: W) -> Result<Box<Self>> {
        write!(writer, "## {}\n\n", name)?;

        Ok(Box::new(Self {
            last_hashes: Vec::new(),
            writer,
            step: 0,
        }))
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn display_messages(&mut self, messages: &[Message]) -> Result<()> {
        write!(self.writer, "### Step {}\n", self.step)?;

        messages
            .iter()
            .try_for_each(|m| write!(self.writer, "{}", m))?;

        write!(self.writer, "---\n")?;

        Ok(())
    }

    fn display_history_reset(&mut self) -> Result<()> {
        write!(self.writer, "## [NEW CONVERSATION]\n\n")?;
        Ok(())
    }

    fn prefix_match_len(&self, new_hashes: &[u64]) -> usize {
        new_hashes
            .iter()
            .zip(self.last_hashes.iter())
            .take_while(|&(a, b)| *a == *b)
            .count()
    }
}

impl<W: Write + Send> Callback for MessageLogger<W> {
    fn call(&mut self, messages: &[Message]) -> Result<()> {
        let new_hashes = messages.iter().map(Message::get_hash).collect::<Vec<_>>();

        if new_hashes.len() < self.last_hashes.len()
            || self.prefix_match_len(&new_hashes) != self.last_hashes.len()
        {
            self.display_history_reset()?;
            self.display_messages(messages)?;
        } else {
            self.display_messages(&messages[self.last_hashes.len()..])?;
        }

        self.writer.flush()?;

        self.step += 1;
        self.last_hashes = new_hashes;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ContentBlock;

    fn transcript(logger: Box<MessageLogger<Vec<u8>>>) -> String {
        String::from_utf8((*logger).into_inner()).unwrap()
    }

    #[test]
    fn test_logs_only_new_messages() -> Result<()> {
        let mut logger = MessageLogger::new("review", Vec::new())?;

        let mut history = vec![Message::user("first question")];
        logger.call(&history)?;

        history.push(Message::assistant(vec![ContentBlock::Text(
            "an answer".to_string(),
        )]));
        logger.call(&history)?;

        let out = transcript(logger);
        assert!(out.starts_with("## review\n\n"));
        assert_eq!(out.matches("first question").count(), 1);
        assert!(out.contains("### Step 1"));
        assert!(out.contains("an answer"));
        assert!(!out.contains("NEW CONVERSATION"));
        Ok(())
    }

    #[test]
    fn test_logs_reset_when_history_diverges() -> Result<()> {
        let mut logger = MessageLogger::new("review", Vec::new())?;
        logger.call(&[Message::user("a"), Message::user("b")])?;
        logger.call(&[Message::user("c")])?;

        let out = transcript(logger);
        assert!(out.contains("## [NEW CONVERSATION]"));
        Ok(())
    }
}
