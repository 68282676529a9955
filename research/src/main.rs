mod config;
mod display;
mod export;
mod research;
mod session;
mod shell;

use anyhow::Context;
use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "research",
    about = "Academic literature search backed by a web search enabled llm"
)]
struct Cli {
    #[command(flatten)]
    config: config::Config,

    /// Directory for exported findings and metadata
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,

    /// Print results without writing export files
    #[arg(long)]
    no_export: bool,

    /// Append the review conversations to this markdown file
    #[arg(long)]
    transcript: Option<PathBuf>,

    /// More logging, repeat for debug output
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fast answer to a specific question, one request
    Quick { question: String },
    /// Comprehensive literature review over several search iterations
    Review {
        question: String,

        /// Focus area, may be repeated
        #[arg(long)]
        focus: Vec<String>,

        #[arg(long, default_value = research::DEFAULT_TIME_FRAME)]
        time_frame: String,

        /// Maximum number of search iterations
        #[arg(long, default_value_t = research::DEFAULT_MAX_ITERATIONS)]
        max_iterations: usize,
    },
    /// Interactive session reading commands from stdin
    Shell,
}

impl Command {
    /// The shell starts without a key and accepts one with its `key` command.
    fn requires_key(&self) -> bool {
        !matches!(self, Command::Shell)
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn search_failed(err: agent::Error) -> ! {
    tracing::error!(%err, "search failed");
    eprintln!("Search failed: {}", err);
    std::process::exit(1)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // report a missing key before any search starts
    if cli.command.requires_key() {
        cli.config.resolve().context("invalid configuration")?;
    }

    let exporter = (!cli.no_export).then(|| export::Exporter::new(&cli.out_dir));
    let mut session = session::Session::new(cli.config, cli.transcript, exporter);

    match cli.command {
        Command::Quick { question } => {
            let (findings, exported) = session
                .quick(&question, Some(&mut display::print_progress))
                .await
                .unwrap_or_else(|err| search_failed(err));

            println!("{}", findings);
            let status = display::export_status(&exported, |path| path.display().to_string());
            if let Some(line) = status {
                eprintln!("{}", line);
            }
        }
        Command::Review {
            question,
            focus,
            time_frame,
            max_iterations,
        } => {
            let request = research::ReviewRequest {
                question,
                focus: research::parse_focus(focus.iter().map(String::as_str)),
                time_frame,
                max_iterations,
            };
            eprintln!("{}", display::estimate(request.max_iterations));

            let (review, exported) = session
                .review(&request, Some(&mut display::print_progress))
                .await
                .unwrap_or_else(|err| search_failed(err));

            print!("{}", display::review_summary(&review));
            let status = display::export_status(&exported, |(findings, metadata)| {
                format!("{} and {}", findings.display(), metadata.display())
            });
            if let Some(line) = status {
                eprintln!("{}", line);
            }
        }
        Command::Shell => {
            shell::run(&mut session, research::ReviewRequest::new(String::new())).await?;
        }
    }

    Ok(())
}
