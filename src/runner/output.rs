use colored::*;
use std::io::Write;
use std::sync::Mutex;

/// Where output-channel runs write. Shared with the stream pumps.
pub trait OutputSurface: Send + Sync {
    fn append(&self, text: &str);
    fn append_line(&self, line: &str);
    fn clear(&self);
    fn show(&self, preserve_focus: bool);
}

/// Writes run output straight to the process stdout.
#[derive(Default)]
pub struct ConsoleOutput {
    shown: Mutex<bool>,
}

impl ConsoleOutput {
    pub fn new() -> Self {
        Self::default()
    }
}

impl OutputSurface for ConsoleOutput {
    fn append(&self, text: &str) {
        let mut out = std::io::stdout().lock();
        let _ = out.write_all(text.as_bytes());
        let _ = out.flush();
    }

    fn append_line(&self, line: &str) {
        // A closed stdout (e.g. piped into `head`) only loses output
        let mut out = std::io::stdout().lock();
        let _ = if let Some(cmd) = line.strip_prefix("[Running]") {
            writeln!(out, "{}{}", "[Running]".blue().bold(), cmd)
        } else if let Some(rest) = line.strip_prefix("[Done]") {
            writeln!(out, "{}{}", "[Done]".green().bold(), rest.dimmed())
        } else {
            writeln!(out, "{}", line)
        };
    }

    fn clear(&self) {
        let mut out = std::io::stdout().lock();
        let _ = out.write_all(b"\x1B[2J\x1B[H");
        let _ = out.flush();
    }

    fn show(&self, preserve_focus: bool) {
        let mut shown = self.shown.lock().unwrap_or_else(|e| e.into_inner());
        if !*shown {
            log::debug!("Output shown (preserve focus: {})", preserve_focus);
            *shown = true;
        }
    }
}

/// Collects output in memory.
#[cfg(test)]
#[derive(Default)]
pub struct BufferedOutput {
    text: Mutex<String>,
}

#[cfg(test)]
impl BufferedOutput {
    pub fn contents(&self) -> String {
        self.text.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[cfg(test)]
impl OutputSurface for BufferedOutput {
    fn append(&self, text: &str) {
        self.text.lock().unwrap_or_else(|e| e.into_inner()).push_str(text);
    }

    fn append_line(&self, line: &str) {
        let mut text = self.text.lock().unwrap_or_else(|e| e.into_inner());
        text.push_str(line);
        text.push('\n');
    }

    fn clear(&self) {
        self.text.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    fn show(&self, _preserve_focus: bool) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_console_output_default() {
        let out = ConsoleOutput::default();
        assert!(!*out.shown.lock().unwrap());
        out.show(true);
        out.show(false);
        assert!(*out.shown.lock().unwrap());
        assert!(!*ConsoleOutput::new().shown.lock().unwrap());
    }

    #[test]
    fn test_console_output_survives_writes() {
        let out = ConsoleOutput::new();
        out.append_line("[Running] true");
        out.append_line("");
        out.append_line("[Done] exited with code=0 in 0.001 seconds");
    }

    #[test]
    fn test_buffered_output() {
        let out = BufferedOutput::default();
        out.append("a");
        out.append_line("b");
        assert_eq!(out.contents(), "ab\n");
        out.clear();
        assert_eq!(out.contents(), "");
    }
}
