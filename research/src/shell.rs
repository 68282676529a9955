use crate::display;
use crate::research::{ReviewRequest, parse_focus};
use crate::session::Session;
use agent::Result;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;

const HELP: &str = "commands:
  quick <question>      fast answer to a specific question
  review <question>     comprehensive literature review
  focus <topic>         add a focus area for reviews
  clear-focus           remove all focus areas
  time-frame <label>    time frame for reviews, e.g. \"last 5 years\"
  depth <n>             maximum review iterations
  key <api key>         switch api key
  stats                 show session settings and search count
  help                  show this message
  quit                  leave the session";

#[derive(Debug, PartialEq)]
pub enum Command {
    Quick(String),
    Review(String),
    Focus(String),
    ClearFocus,
    TimeFrame(String),
    Depth(usize),
    Key(String),
    Stats,
    Help,
    Quit,
    Empty,
}

pub fn parse(line: &str) -> std::result::Result<Command, String> {
    let line = line.trim();
    let (name, rest) = line
        .split_once(char::is_whitespace)
        .map(|(name, rest)| (name, rest.trim()))
        .unwrap_or((line, ""));

    let required = |what: &str| {
        if rest.is_empty() {
            Err(format!("{} expects {}", name, what))
        } else {
            Ok(rest.to_string())
        }
    };

    match name {
        "" => Ok(Command::Empty),
        "quick" => required("a question").map(Command::Quick),
        "review" => required("a research question").map(Command::Review),
        "focus" => required("a topic").map(Command::Focus),
        "clear-focus" => Ok(Command::ClearFocus),
        "time-frame" => required("a label").map(Command::TimeFrame),
        "depth" => match rest.parse::<usize>() {
            Ok(n) if n > 0 => Ok(Command::Depth(n)),
            _ => Err("depth expects a positive number".to_string()),
        },
        "key" => required("an api key").map(Command::Key),
        "stats" => Ok(Command::Stats),
        "help" => Ok(Command::Help),
        "quit" | "exit" => Ok(Command::Quit),
        other => Err(format!("unknown command '{}', try help", other)),
    }
}

/// Interactive session on stdin. Search failures are reported and the session
/// continues.
pub async fn run(session: &mut Session, mut template: ReviewRequest) -> Result<()> {
    let mut focus = template.focus.take().unwrap_or_default();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("{}", HELP);

    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        let command = match parse(&line) {
            Ok(command) => command,
            Err(msg) => {
                println!("{}", msg);
                continue;
            }
        };

        match command {
            Command::Empty => {}
            Command::Quit => break,
            Command::Help => println!("{}", HELP),
            Command::Focus(topic) => focus.push(topic),
            Command::ClearFocus => focus.clear(),
            Command::TimeFrame(label) => template.time_frame = label,
            Command::Depth(n) => template.max_iterations = n,
            Command::Key(key) => session.set_api_key(key),
            Command::Stats => {
                println!("Searches this session: {}", session.search_count());
                println!("Focus areas: {}", focus.join(", "));
                println!("Time frame: {}", template.time_frame);
                println!("Depth: {}", template.max_iterations);
            }
            Command::Quick(question) => {
                match session.quick(&question, Some(&mut display::print_progress)).await {
                    Ok((findings, exported)) => {
                        println!("{}", findings);
                        let status =
                            display::export_status(&exported, |path| path.display().to_string());
                        if let Some(line) = status {
                            println!("{}", line);
                        }
                    }
                    Err(err) => {
                        warn!(%err, "quick search failed");
                        println!("Search failed: {}", err);
                    }
                }
            }
            Command::Review(question) => {
                let request = ReviewRequest {
                    question,
                    focus: parse_focus(focus.iter().map(String::as_str)),
                    ..template.clone()
                };
                println!("{}", display::estimate(request.max_iterations));

                match session.review(&request, Some(&mut display::print_progress)).await {
                    Ok((review, exported)) => {
                        print!("{}", display::review_summary(&review));
                        let status = display::export_status(&exported, |(findings, metadata)| {
                            format!("{} and {}", findings.display(), metadata.display())
                        });
                        if let Some(line) = status {
                            println!("{}", line);
                        }
                    }
                    Err(err) => {
                        warn!(%err, "review failed");
                        println!("Search failed: {}", err);
                    }
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            parse("quick  What is Aiken's V? "),
            Ok(Command::Quick("What is Aiken's V?".to_string()))
        );
        assert_eq!(
            parse("time-frame last 5 years"),
            Ok(Command::TimeFrame("last 5 years".to_string()))
        );
        assert_eq!(parse("depth 12"), Ok(Command::Depth(12)));
        assert_eq!(parse("   "), Ok(Command::Empty));
        assert_eq!(parse("exit"), Ok(Command::Quit));
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse("review").is_err());
        assert!(parse("depth 0").is_err());
        assert!(parse("depth many").is_err());
        assert!(parse("search q").is_err());
    }
}
