use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use colored::*;
use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::{ChildStdin, Command};
use tokio::sync::mpsc::UnboundedSender;
use crate::runner::SessionEvent;

/// A persistent interactive shell that accepts text input.
#[async_trait]
pub trait Terminal: Send {
    fn id(&self) -> u64;
    fn show(&mut self, preserve_focus: bool);
    async fn clear(&mut self) -> Result<()>;
    async fn send_text(&mut self, text: &str) -> Result<()>;
}

/// Creates terminals. Each terminal posts `TerminalClosed` with its id on
/// `events` when the user closes it.
pub trait TerminalHost: Send {
    fn create(&mut self, name: &str, events: UnboundedSender<SessionEvent>) -> Result<Box<dyn Terminal>>;
}

/// Spawns the configured shell with piped stdin; its output goes to ours.
pub struct ShellTerminalHost {
    shell: String,
    cwd: PathBuf,
    env: HashMap<String, String>,
    next_id: u64,
}

impl ShellTerminalHost {
    pub fn new(shell: String, cwd: PathBuf, env: HashMap<String, String>) -> Self {
        Self { shell, cwd, env, next_id: 1 }
    }
}

impl TerminalHost for ShellTerminalHost {
    fn create(&mut self, name: &str, events: UnboundedSender<SessionEvent>) -> Result<Box<dyn Terminal>> {
        let words = shell_words::split(&self.shell)
            .with_context(|| format!("Failed to parse shell: {}", self.shell))?;
        let Some((program, args)) = words.split_first() else {
            bail!("No shell configured");
        };
        let program = which::which(program)
            .with_context(|| format!("Shell not found: {}", program))?;

        let mut child = Command::new(&program)
            .args(args)
            .current_dir(&self.cwd)
            .envs(&self.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .with_context(|| format!("Failed to start terminal shell: {}", program.display()))?;
        let stdin = child.stdin.take().context("Terminal shell has no stdin")?;

        let terminal_id = self.next_id;
        self.next_id += 1;

        tokio::spawn(async move {
            if let Err(e) = child.wait().await {
                log::warn!("Failed to wait for terminal {}: {}", terminal_id, e);
            }
            let _ = events.send(SessionEvent::TerminalClosed { terminal_id });
        });

        log::debug!("Created terminal '{}' ({})", name, terminal_id);
        Ok(Box::new(ShellTerminal {
            id: terminal_id,
            name: name.to_string(),
            stdin,
            shown: false,
        }))
    }
}

pub struct ShellTerminal {
    id: u64,
    name: String,
    stdin: ChildStdin,
    shown: bool,
}

#[async_trait]
impl Terminal for ShellTerminal {
    fn id(&self) -> u64 {
        self.id
    }

    fn show(&mut self, preserve_focus: bool) {
        if !self.shown {
            eprintln!("{} {}", "▶".cyan(), self.name.bold());
            self.shown = true;
        }
        log::debug!("Terminal {} shown (preserve focus: {})", self.id, preserve_focus);
    }

    async fn clear(&mut self) -> Result<()> {
        let mut out = std::io::stdout().lock();
        out.write_all(b"\x1B[2J\x1B[H")?;
        out.flush()?;
        Ok(())
    }

    async fn send_text(&mut self, text: &str) -> Result<()> {
        self.stdin
            .write_all(format!("{}\n", text).as_bytes())
            .await
            .context("Failed to send text to terminal")?;
        self.stdin.flush().await.context("Failed to send text to terminal")?;
        Ok(())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_shell_terminal_runs_text_and_reports_close() {
        let dir = tempfile::tempdir().unwrap();
        let mut host = ShellTerminalHost::new("sh".to_string(), dir.path().to_path_buf(), HashMap::new());
        let (tx, mut rx) = mpsc::unbounded_channel();

        let mut terminal = host.create("Code", tx).unwrap();
        assert_eq!(terminal.id(), 1);
        terminal.send_text("echo ran > out.txt").await.unwrap();
        drop(terminal);

        match rx.recv().await.unwrap() {
            SessionEvent::TerminalClosed { terminal_id } => assert_eq!(terminal_id, 1),
            other => panic!("unexpected event: {:?}", other),
        }
        assert_eq!(std::fs::read_to_string(dir.path().join("out.txt")).unwrap().trim(), "ran");
    }

    #[test]
    fn test_missing_shell() {
        let mut host = ShellTerminalHost::new(
            "definitely-not-a-shell-xyz".to_string(),
            PathBuf::from("."),
            HashMap::new(),
        );
        let (tx, _rx) = mpsc::unbounded_channel();
        assert!(host.create("Code", tx).is_err());
    }
}
