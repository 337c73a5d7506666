use std::path::PathBuf;
use std::time::Instant;

/// Output-channel run currently in flight.
#[derive(Debug, Clone)]
pub struct ActiveRun {
    pub id: u64,
    pub pid: u32,
    pub started: Instant,
}

/// Per-session record of the run being prepared or executed.
///
/// Reset at the start of every run; `active` outlives the reset while a
/// process is still running.
#[derive(Debug, Default)]
pub struct ExecutionContext {
    pub language_id: Option<String>,
    pub executor: Option<String>,
    pub code_file: Option<PathBuf>,
    pub is_temporary: bool,
    pub cwd: PathBuf,
    pub active: Option<ActiveRun>,
}

impl ExecutionContext {
    pub fn initialize(&mut self, cwd: PathBuf) {
        self.language_id = None;
        self.executor = None;
        self.code_file = None;
        self.is_temporary = false;
        self.cwd = cwd;
    }

    pub fn is_running(&self) -> bool {
        self.active.is_some()
    }

    pub fn describe(&self) -> String {
        format!(
            "language={} executor={:?} file={} temporary={} cwd={}",
            self.language_id.as_deref().unwrap_or("-"),
            self.executor.as_deref().unwrap_or(""),
            self.code_file
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "-".to_string()),
            self.is_temporary,
            self.cwd.display()
        )
    }
}
