pub mod custom;
pub mod languages;
pub mod run;
pub mod session;

use anyhow::{Context, Result, bail};
use std::env;
use std::io::Read;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use crate::cli::Source;
use crate::config::load_config;
use crate::editor::{FileEditor, Selection};
use crate::platform::Platform;
use crate::runner::output::ConsoleOutput;
use crate::runner::terminal::ShellTerminalHost;
use crate::runner::{RunOutcome, Session, SessionEvent};

/// Loads settings for the current directory and opens the requested source
/// as the active document.
pub fn open_session(source: &Source, force_terminal: bool) -> Result<Session> {
    let current_dir = env::current_dir()?;
    let mut config = load_config(&current_dir)?;
    if force_terminal {
        config.run_in_terminal = true;
    }

    let platform = Platform::detect(&config);
    let selection = source.lines.as_deref().map(Selection::parse).transpose()?;

    let mut editor = FileEditor::new(Some(current_dir.clone()));
    if let Some(file) = &source.file {
        editor.open_file(file, selection)?;
    } else if source.stdin {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read code from stdin")?;
        let language = source
            .language
            .as_deref()
            .or(config.default_language.as_deref())
            .unwrap_or("plaintext");
        editor.open_untitled(text, language, selection);
    }

    let terminals = ShellTerminalHost::new(platform.shell.clone(), current_dir, config.env.clone());
    Ok(Session::new(
        Arc::new(config),
        platform,
        Box::new(editor),
        Arc::new(ConsoleOutput::new()),
        Box::new(terminals),
    ))
}

/// Ctrl-C stops the running process instead of killing us.
pub fn install_stop_handler(sender: UnboundedSender<SessionEvent>) -> Result<()> {
    ctrlc::set_handler(move || {
        let _ = sender.send(SessionEvent::Stop);
    })
    .context("Failed to install Ctrl-C handler")
}

/// One-shot commands fail when the run was refused.
pub fn require_accepted(outcome: RunOutcome) -> Result<()> {
    match outcome {
        RunOutcome::Rejected(notice) => bail!(notice),
        RunOutcome::Started { run_id } => {
            log::debug!("Run {} in progress", run_id);
            Ok(())
        }
        RunOutcome::SentToTerminal => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::Notice;

    #[test]
    fn test_rejected_run_is_an_error() {
        let err = require_accepted(RunOutcome::Rejected(Notice::UnsupportedLanguage)).unwrap_err();
        assert_eq!(err.downcast_ref::<Notice>(), Some(&Notice::UnsupportedLanguage));
        assert_eq!(err.to_string(), "Code language not supported or defined.");

        assert!(require_accepted(RunOutcome::Started { run_id: 1 }).is_ok());
        assert!(require_accepted(RunOutcome::SentToTerminal).is_ok());
    }
}
