use anyhow::{Result, bail};
use colored::*;
use tokio::io::{AsyncBufReadExt, BufReader};
use crate::cli::Source;
use crate::handlers::{install_stop_handler, open_session};
use crate::runner::{RunRequest, Session, SessionEvent};

#[derive(Debug, PartialEq)]
enum Input {
    Event(SessionEvent),
    Stop,
    Quit,
    Empty,
    Unknown(String),
}

fn parse_input(line: &str, default_language: Option<&str>) -> Input {
    let mut words = line.split_whitespace();
    match words.next() {
        None => Input::Empty,
        Some("run" | "r") => Input::Event(SessionEvent::Run(RunRequest {
            language_id: words.next().or(default_language).map(String::from),
            file: None,
        })),
        Some("custom" | "c") => Input::Event(SessionEvent::RunCustom),
        Some("stop" | "s") => Input::Stop,
        Some("quit" | "exit" | "q") => Input::Quit,
        Some(other) => Input::Unknown(other.to_string()),
    }
}

async fn apply(session: &mut Session, event: SessionEvent) {
    if let Err(e) = session.handle(event).await {
        eprintln!("{} {:#}", "❌".red(), e);
    }
}

pub async fn handle_session(source: Source) -> Result<()> {
    if source.stdin {
        bail!("--stdin cannot be combined with session; commands are read from stdin");
    }
    let mut session = open_session(&source, false)?;
    install_stop_handler(session.sender())?;

    eprintln!(
        "{} Commands: {} [language], {}, {}, {}",
        "⚡".yellow(),
        "run".bold(),
        "custom".bold(),
        "stop".bold(),
        "quit".bold()
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match parse_input(&line, source.language.as_deref()) {
                    Input::Event(event) => apply(&mut session, event).await,
                    Input::Stop => {
                        if !session.stop() {
                            eprintln!("{} Nothing is running.", "ℹ".cyan());
                        }
                    }
                    Input::Quit => break,
                    Input::Empty => {}
                    Input::Unknown(word) => eprintln!("{} Unknown command: {}", "⚠️".yellow(), word),
                }
            }
            Some(event) = session.next_event() => {
                // Ctrl-C while idle leaves the session
                if matches!(event, SessionEvent::Stop) && !session.is_running() {
                    break;
                }
                apply(&mut session, event).await;
            }
        }
    }

    session.stop();
    session.wait_idle().await?;
    session.close_terminal().await
}
