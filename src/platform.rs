use regex::{Captures, Regex};
use std::sync::LazyLock;
use crate::config::RunnerConfig;
use crate::utils::detect_shell;

static DRIVE_LETTER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([A-Za-z]):\\").expect("valid drive letter pattern"));

/// Host facts that decide how a built command is rewritten.
#[derive(Debug, Clone)]
pub struct Platform {
    pub is_windows: bool,
    /// Configured interactive shell name, e.g. `powershell.exe` or `C:\Windows\System32\bash.exe`.
    pub shell: String,
    pub terminal_root: Option<String>,
}

impl Platform {
    pub fn detect(config: &RunnerConfig) -> Self {
        Self {
            is_windows: cfg!(windows),
            shell: detect_shell(config.shell.as_ref()),
            terminal_root: config.terminal_root.clone().filter(|r| !r.is_empty()),
        }
    }

    fn is_powershell(&self) -> bool {
        self.is_windows && self.shell.to_lowercase().contains("powershell")
    }

    fn is_bash_on_windows(&self) -> bool {
        let shell = self.shell.to_lowercase();
        self.is_windows && shell.contains("bash") && shell.contains("windows")
    }

    /// Turns `a && b && c` into PowerShell's `a ; if ($?) { b } ; if ($?) { c }`.
    ///
    /// Runs on the template, before placeholder substitution, so the
    /// `$dir$fileNameWithoutExt` executable path can be made relative.
    pub fn adapt_powershell_chain(&self, executor: &str) -> String {
        if !self.is_powershell() || !executor.contains(" && ") {
            return executor.to_string();
        }

        let replacement = "; if ($?) {";
        let executor = executor.replacen("&&", replacement, 1);
        let executor = executor.replace("&&", &format!("}} {}", replacement));
        let executor = executor.replace("$dir$fileNameWithoutExt", r".\$fileNameWithoutExt");
        format!("{} }}", executor)
    }

    /// Translates Windows drive paths for POSIX shells running on a Windows host.
    /// Only used for text sent to an interactive terminal.
    pub fn adapt_terminal_paths(&self, command: &str) -> String {
        if !self.is_windows {
            return command.to_string();
        }

        if let Some(root) = &self.terminal_root {
            let rewritten = DRIVE_LETTER.replace_all(command, |caps: &Captures| {
                format!("{}{}/", root, caps[1].to_lowercase())
            });
            return rewritten.replace('\\', "/");
        }

        if self.is_bash_on_windows() {
            let rewritten = DRIVE_LETTER.replace_all(command, |caps: &Captures| {
                format!("/mnt/{}/", caps[1].to_lowercase())
            });
            return rewritten.replace('\\', "/");
        }

        command.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn platform(is_windows: bool, shell: &str, terminal_root: Option<&str>) -> Platform {
        Platform {
            is_windows,
            shell: shell.to_string(),
            terminal_root: terminal_root.map(String::from),
        }
    }

    #[test]
    fn test_powershell_chain() {
        let ps = platform(true, r"C:\WINDOWS\System32\WindowsPowerShell\v1.0\powershell.exe", None);
        let adapted = ps.adapt_powershell_chain(
            "gcc $dir$fileNameWithoutExt.c -o $dir$fileNameWithoutExt && $dir$fileNameWithoutExt",
        );
        assert_eq!(
            adapted,
            r"gcc .\$fileNameWithoutExt.c -o .\$fileNameWithoutExt ; if ($?) { .\$fileNameWithoutExt }"
        );
    }

    #[test]
    fn test_powershell_chain_with_three_steps() {
        let ps = platform(true, "powershell", None);
        let adapted = ps.adapt_powershell_chain("cd $dir && javac $fileName && java $fileNameWithoutExt");
        assert_eq!(
            adapted,
            "cd $dir ; if ($?) { javac $fileName } ; if ($?) { java $fileNameWithoutExt }"
        );
        assert!(!adapted.contains("&&"));
    }

    #[test]
    fn test_powershell_chain_untouched_elsewhere() {
        let template = "cd $dir && rustc $fileName";
        assert_eq!(platform(false, "powershell", None).adapt_powershell_chain(template), template);
        assert_eq!(platform(true, "cmd.exe", None).adapt_powershell_chain(template), template);
        assert_eq!(platform(true, "powershell", None).adapt_powershell_chain("python -u"), "python -u");
    }

    #[test]
    fn test_terminal_root() {
        let p = platform(true, "bash.exe", Some("/c/"));
        assert_eq!(
            p.adapt_terminal_paths(r#"python -u "D:\work\a.py""#),
            r#"python -u "/c/d/work/a.py""#
        );
    }

    #[test]
    fn test_bash_on_windows() {
        let p = platform(true, r"C:\Windows\System32\bash.exe", None);
        assert_eq!(
            p.adapt_terminal_paths(r#"cd "C:\Users\u\" && gcc a.c"#),
            r#"cd "/mnt/c/Users/u/" && gcc a.c"#
        );
    }

    #[test]
    fn test_paths_untouched_without_matching_shell() {
        let cmd = r#"python "C:\a.py""#;
        assert_eq!(platform(true, "cmd.exe", None).adapt_terminal_paths(cmd), cmd);
        assert_eq!(platform(false, "bash", Some("/mnt/")).adapt_terminal_paths(cmd), cmd);
    }
}
