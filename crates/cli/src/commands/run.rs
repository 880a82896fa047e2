//! `deepresearch run`: clarify and research one query in the terminal.
//!
//! Status lines go to stderr and the finished report to stdout, so
//! `deepresearch run -q "..." > report.md` captures just the report.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use deepresearch_agent::assistant::CLARIFYING_STATUS;
use deepresearch_agent::{LlmInvoker, NOT_ANSWERED, ResearchAssistant, ResearchEvent, ResearchOptions};
use deepresearch_core::event::EventBus;
use deepresearch_core::session::SessionState;
use futures::StreamExt;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};

pub async fn run(
    query: Option<String>,
    no_email: bool,
    output: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(no_email)?;

    let provider = deepresearch_providers::build_from_config(&config)?;
    let event_bus = Arc::new(EventBus::default());
    deepresearch_gateway::spawn_event_logger(&event_bus);
    let invoker = LlmInvoker::from_config(&config, provider, event_bus.clone())?;
    let assistant = ResearchAssistant::new(
        Arc::new(invoker),
        ResearchOptions::from(&config.research),
        event_bus,
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    let query = match query {
        Some(query) => query,
        None => {
            prompt("Research query: ")?;
            lines.next_line().await?.unwrap_or_default()
        }
    };

    let mut state = SessionState::default();
    eprintln!("{CLARIFYING_STATUS}");
    let outcome = assistant.generate_questions(&mut state, &query).await;
    eprintln!("{}", outcome.status);
    let Some(questions) = state.questions() else {
        return Ok(());
    };

    eprintln!("\nAnswer each question (leave blank to skip):\n");
    let mut answers_text = String::new();
    for (i, question) in questions.iter().enumerate() {
        let n = i + 1;
        eprintln!("Q{n}: {question}");
        prompt(&format!("A{n}: "))?;
        let answer = lines.next_line().await?.unwrap_or_default();
        let answer = match answer.trim() {
            "" => NOT_ANSWERED,
            answer => answer,
        };
        answers_text.push_str(&format!("**A{n}:** {answer}\n"));
    }
    eprintln!();
    debug!(chars = answers_text.len(), "Collected answers");

    let mut stream = assistant.run_research(&state, &answers_text);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut report = None;
    let mut failed = false;
    loop {
        tokio::select! {
            event = stream.next() => match event {
                Some(ResearchEvent::Report { markdown }) => {
                    println!("{markdown}");
                    report = Some(markdown);
                }
                Some(ResearchEvent::Error { message }) => {
                    eprintln!("{message}");
                    failed = true;
                }
                Some(event) => eprintln!("{}", event.text().trim_end()),
                None => break,
            },
            _ = &mut ctrl_c => {
                eprintln!("\nCancelled.");
                info!("Research run cancelled from the terminal");
                stream.cancel();
                return Ok(());
            }
        }
    }

    if let (Some(path), Some(markdown)) = (output, &report) {
        std::fs::write(&path, markdown)?;
        eprintln!("Report written to {}", path.display());
    }

    if failed {
        return Err("research failed".into());
    }
    Ok(())
}

fn prompt(text: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    stderr.write_all(text.as_bytes())?;
    stderr.flush()
}
