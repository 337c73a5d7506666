pub mod context;
pub mod output;
pub mod process;
pub mod terminal;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use crate::command::build_command;
use crate::config::RunnerConfig;
use crate::editor::{Document, Editor};
use crate::materializer::{CodeFile, materialize};
use crate::platform::Platform;
use crate::resolver::resolve_executor;
use self::context::{ActiveRun, ExecutionContext};
use self::output::OutputSurface;
use self::terminal::{Terminal, TerminalHost};

const TERMINAL_NAME: &str = "Code";

/// Why a run did not start. Shown to the user; nothing was launched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Notice {
    #[error("No code found or selected.")]
    NoCode,
    #[error("Code language not supported or defined.")]
    UnsupportedLanguage,
    #[error("Code is already running!")]
    AlreadyRunning,
    #[error("No custom command configured.")]
    NoCustomCommand,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Output-channel process spawned; completion arrives as `ProcessExited`.
    Started { run_id: u64 },
    SentToTerminal,
    Rejected(Notice),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunRequest {
    /// Run as this language instead of the document's.
    pub language_id: Option<String>,
    /// Run this file instead of the active document.
    pub file: Option<PathBuf>,
}

#[derive(Debug, PartialEq, Eq)]
pub enum SessionEvent {
    Run(RunRequest),
    RunCustom,
    Stop,
    ProcessExited {
        run_id: u64,
        code: Option<i32>,
        temp_file: Option<PathBuf>,
    },
    TerminalClosed {
        terminal_id: u64,
    },
}

/// One editor session: owns the execution context, the terminal reference and
/// the event queue that process and terminal callbacks post back to.
pub struct Session {
    config: Arc<RunnerConfig>,
    platform: Platform,
    editor: Box<dyn Editor>,
    output: Arc<dyn OutputSurface>,
    terminals: Box<dyn TerminalHost>,
    terminal: Option<Box<dyn Terminal>>,
    context: ExecutionContext,
    next_run_id: u64,
    /// Spawned processes whose exit has not been handled yet.
    unreported: usize,
    events_tx: UnboundedSender<SessionEvent>,
    events_rx: UnboundedReceiver<SessionEvent>,
}

impl Session {
    pub fn new(
        config: Arc<RunnerConfig>,
        platform: Platform,
        editor: Box<dyn Editor>,
        output: Arc<dyn OutputSurface>,
        terminals: Box<dyn TerminalHost>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            config,
            platform,
            editor,
            output,
            terminals,
            terminal: None,
            context: ExecutionContext::default(),
            next_run_id: 1,
            unreported: 0,
            events_tx,
            events_rx,
        }
    }

    /// Sender for posting events from outside the loop (signal handlers, input readers).
    pub fn sender(&self) -> UnboundedSender<SessionEvent> {
        self.events_tx.clone()
    }

    pub fn is_running(&self) -> bool {
        self.context.is_running()
    }

    /// Terminal sends are fire-and-forget and skip the running guard; the
    /// output-channel path re-checks once the code file is known.
    fn is_busy(&self) -> bool {
        self.is_running() && !self.config.run_in_terminal
    }

    #[cfg(test)]
    pub fn has_terminal(&self) -> bool {
        self.terminal.is_some()
    }

    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        self.events_rx.recv().await
    }

    /// Applies one event. Rejected runs are reported through the editor.
    pub async fn handle(&mut self, event: SessionEvent) -> Result<()> {
        let outcome = match event {
            SessionEvent::Run(request) => self.run(request).await?,
            SessionEvent::RunCustom => self.run_custom().await?,
            SessionEvent::Stop => {
                self.stop();
                return Ok(());
            }
            SessionEvent::ProcessExited { run_id, code, temp_file } => {
                self.finish(run_id, code, temp_file);
                return Ok(());
            }
            SessionEvent::TerminalClosed { terminal_id } => {
                self.terminal_closed(terminal_id);
                return Ok(());
            }
        };
        match outcome {
            RunOutcome::Rejected(notice) => self.editor.notify(&notice.to_string()),
            RunOutcome::Started { run_id } => log::debug!("Run {} in progress", run_id),
            RunOutcome::SentToTerminal => {}
        }
        Ok(())
    }

    /// Processes events until every spawned process has reported its exit,
    /// including stopped ones whose temp files still need removing.
    pub async fn wait_idle(&mut self) -> Result<()> {
        while self.unreported > 0 {
            match self.next_event().await {
                Some(event) => self.handle(event).await?,
                None => break,
            }
        }
        Ok(())
    }

    /// Drops the terminal so its shell sees end of input, then waits for its
    /// close notification while still handling other events.
    pub async fn close_terminal(&mut self) -> Result<()> {
        let Some(terminal) = self.terminal.take() else {
            return Ok(());
        };
        let id = terminal.id();
        drop(terminal);

        while let Some(event) = self.next_event().await {
            if matches!(event, SessionEvent::TerminalClosed { terminal_id } if terminal_id == id) {
                break;
            }
            self.handle(event).await?;
        }
        Ok(())
    }

    pub async fn run(&mut self, request: RunRequest) -> Result<RunOutcome> {
        if self.is_busy() {
            return Ok(RunOutcome::Rejected(Notice::AlreadyRunning));
        }

        let run_from_file = request.file.is_some();
        let document = match &request.file {
            Some(path) => self.editor.open_document(path).await?,
            None => match self.editor.active_document() {
                Some(document) => document,
                None => return Ok(RunOutcome::Rejected(Notice::NoCode)),
            },
        };

        let cwd = self.working_directory(Some(&document));
        self.context.initialize(cwd);

        let file_extension = document.file_extension();
        let Some(resolved) = resolve_executor(
            &self.config,
            &document,
            request.language_id.as_deref(),
            &file_extension,
        ) else {
            return Ok(RunOutcome::Rejected(Notice::UnsupportedLanguage));
        };
        log::debug!("Resolved {} -> {}", resolved.language_id, resolved.executor);

        self.context.language_id = Some(resolved.language_id.clone());
        self.context.executor = Some(resolved.executor.clone());

        let code_file = self
            .materialize(&document, &resolved.language_id, &file_extension, run_from_file)
            .await?;
        self.dispatch(&resolved.executor, Some(code_file), true).await
    }

    /// Runs `customCommand` against the active document without appending it.
    pub async fn run_custom(&mut self) -> Result<RunOutcome> {
        if self.is_busy() {
            return Ok(RunOutcome::Rejected(Notice::AlreadyRunning));
        }
        let Some(executor) = self.config.custom_command().map(str::to_string) else {
            return Ok(RunOutcome::Rejected(Notice::NoCustomCommand));
        };

        let document = self.editor.active_document();
        let cwd = self.working_directory(document.as_ref());
        self.context.initialize(cwd);
        self.context.executor = Some(executor.clone());

        let code_file = match &document {
            Some(document) => {
                let language_id = document.language_id.clone();
                self.context.language_id = Some(language_id.clone());
                let file_extension = document.file_extension();
                Some(self.materialize(document, &language_id, &file_extension, false).await?)
            }
            None => None,
        };
        self.dispatch(&executor, code_file, false).await
    }

    /// Kills the in-flight output-channel run. Returns false when nothing was running.
    pub fn stop(&mut self) -> bool {
        let Some(active) = self.context.active.take() else {
            return false;
        };
        if let Err(e) = process::kill_tree(active.pid) {
            log::warn!("Failed to stop run {}: {:#}", active.id, e);
        }
        log::debug!("Stopped run {}", active.id);
        true
    }

    fn working_directory(&self, document: Option<&Document>) -> PathBuf {
        if let Some(cwd) = &self.config.cwd {
            return cwd.clone();
        }
        if self.config.file_directory_as_cwd {
            if let Some(dir) = document.and_then(|d| d.path.as_deref()).and_then(Path::parent) {
                return dir.to_path_buf();
            }
        }
        self.editor.workspace_root().unwrap_or_else(std::env::temp_dir)
    }

    async fn materialize(
        &mut self,
        document: &Document,
        language_id: &str,
        file_extension: &str,
        run_from_file: bool,
    ) -> Result<CodeFile> {
        let code_file = materialize(
            document,
            self.editor.as_mut(),
            &self.config,
            language_id,
            file_extension,
            &self.context.cwd,
            run_from_file,
        )
        .await?;
        self.context.code_file = Some(code_file.path.clone());
        self.context.is_temporary = code_file.is_temporary;
        Ok(code_file)
    }

    async fn dispatch(
        &mut self,
        executor: &str,
        code_file: Option<CodeFile>,
        append_file: bool,
    ) -> Result<RunOutcome> {
        log::debug!("Dispatching {}", self.context.describe());
        let is_temporary = code_file.as_ref().is_some_and(|c| c.is_temporary);
        if self.config.run_in_terminal && !is_temporary {
            let path = code_file.map(|c| c.path);
            self.execute_in_terminal(executor, path.as_deref(), append_file).await
        } else {
            self.execute_in_output(executor, code_file, append_file)
        }
    }

    fn execute_in_output(
        &mut self,
        executor: &str,
        code_file: Option<CodeFile>,
        append_file: bool,
    ) -> Result<RunOutcome> {
        let temp_file = code_file.as_ref().filter(|c| c.is_temporary).map(|c| c.path.clone());

        if self.is_running() {
            if let Some(path) = &temp_file {
                remove_temp_file(path);
            }
            return Ok(RunOutcome::Rejected(Notice::AlreadyRunning));
        }

        if self.config.clear_previous_output {
            self.output.clear();
        }
        self.output.show(self.config.preserve_focus);

        let workspace_root = self.editor.workspace_root();
        let command = build_command(
            executor,
            code_file.as_ref().map(|c| c.path.as_path()),
            workspace_root.as_deref(),
            append_file,
        );
        if self.config.show_execution_message {
            self.output.append_line(&format!("[Running] {}", command));
        }

        let started = Instant::now();
        let spawned = process::spawn_shell_command(&command, &self.context.cwd, &self.config.env)
            .and_then(|child| {
                let pid = child.id().context("Spawned process exited before it could be tracked")?;
                Ok((child, pid))
            });
        let (child, pid) = match spawned {
            Ok(spawned) => spawned,
            Err(e) => {
                if let Some(path) = &temp_file {
                    remove_temp_file(path);
                }
                return Err(e);
            }
        };

        let run_id = self.next_run_id;
        self.next_run_id += 1;
        self.context.active = Some(ActiveRun { id: run_id, pid, started });
        self.unreported += 1;
        log::debug!("Started run {} (pid {}): {}", run_id, pid, command);

        process::watch(child, run_id, temp_file, self.output.clone(), self.events_tx.clone());
        Ok(RunOutcome::Started { run_id })
    }

    async fn execute_in_terminal(
        &mut self,
        executor: &str,
        code_file: Option<&Path>,
        append_file: bool,
    ) -> Result<RunOutcome> {
        let is_new_terminal = self.terminal.is_none();

        let executor = self.platform.adapt_powershell_chain(executor);
        let workspace_root = self.editor.workspace_root();
        let command = build_command(&executor, code_file, workspace_root.as_deref(), append_file);
        let command = self.platform.adapt_terminal_paths(&command);
        let cd = self.config.file_directory_as_cwd.then(|| {
            let cwd = self.context.cwd.to_string_lossy();
            format!("cd \"{}\"", self.platform.adapt_terminal_paths(&cwd))
        });
        let clear = self.config.clear_previous_output && !is_new_terminal;
        let preserve_focus = self.config.preserve_focus;

        let terminal = match self.terminal.take() {
            Some(terminal) => terminal,
            None => self.terminals.create(TERMINAL_NAME, self.events_tx.clone())?,
        };
        let terminal = self.terminal.insert(terminal);
        terminal.show(preserve_focus);
        if clear {
            terminal.clear().await?;
        }
        if let Some(cd) = cd {
            terminal.send_text(&cd).await?;
        }
        terminal.send_text(&command).await?;
        log::debug!("Sent to terminal {}: {}", terminal.id(), command);

        Ok(RunOutcome::SentToTerminal)
    }

    fn finish(&mut self, run_id: u64, code: Option<i32>, temp_file: Option<PathBuf>) {
        self.unreported = self.unreported.saturating_sub(1);
        let active = self.context.active.take_if(|active| active.id == run_id);

        // A stopped run has already gone idle; only its temp file is left
        if let Some(active) = active {
            let elapsed = active.started.elapsed().as_secs_f64();
            self.output.append_line("");
            if self.config.show_execution_message {
                let status = match code {
                    Some(code) => format!("exited with code={}", code),
                    None => "terminated by signal".to_string(),
                };
                self.output.append_line(&format!("[Done] {} in {:.3} seconds", status, elapsed));
                self.output.append_line("");
            }
        }

        if let Some(path) = temp_file {
            remove_temp_file(&path);
        }
    }

    fn terminal_closed(&mut self, terminal_id: u64) {
        if self.terminal.as_ref().is_some_and(|t| t.id() == terminal_id) {
            log::debug!("Terminal {} closed", terminal_id);
            self.terminal = None;
        }
    }
}

fn remove_temp_file(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        log::warn!("Failed to delete temporary file {}: {}", path.display(), e);
    }
}
