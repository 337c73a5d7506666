use std::env;

/// Interactive shell name: config, then `$SHELL`, then the platform default.
pub fn detect_shell(config_shell: Option<&String>) -> String {
    config_shell
        .cloned()
        .or_else(|| env::var("SHELL").ok())
        .unwrap_or_else(|| if cfg!(windows) { "cmd".to_string() } else { "sh".to_string() })
}

/// Shell used for output-channel runs, with its command flag.
pub fn system_shell() -> (&'static str, &'static str) {
    if cfg!(windows) { ("cmd", "/C") } else { ("sh", "-c") }
}

pub fn quote(path: &str) -> String {
    format!("\"{}\"", path)
}

fn last_separator(path: &str) -> Option<usize> {
    path.rfind(['/', '\\'])
}

/// Directory part including its trailing separator, or "" when there is none.
pub fn dir_with_trailing_separator(path: &str) -> &str {
    match last_separator(path) {
        Some(idx) => &path[..=idx],
        None => "",
    }
}

pub fn dir_without_trailing_separator(path: &str) -> &str {
    match last_separator(path) {
        Some(idx) => &path[..idx],
        None => "",
    }
}

pub fn base_name(path: &str) -> &str {
    match last_separator(path) {
        Some(idx) => &path[idx + 1..],
        None => path,
    }
}

/// Base name without its last extension.
pub fn file_stem(path: &str) -> &str {
    let base = base_name(path);
    match base.rfind('.') {
        Some(idx) => &base[..idx],
        None => base,
    }
}

/// Extension including the dot, "" when the base name has none.
pub fn extension(path: &str) -> &str {
    let base = base_name(path);
    match base.rfind('.') {
        Some(idx) if idx > 0 => &base[idx..],
        _ => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_posix_path_parts() {
        let p = "/home/u/proj/main.test.py";
        assert_eq!(dir_with_trailing_separator(p), "/home/u/proj/");
        assert_eq!(dir_without_trailing_separator(p), "/home/u/proj");
        assert_eq!(base_name(p), "main.test.py");
        assert_eq!(file_stem(p), "main.test");
        assert_eq!(extension(p), ".py");
    }

    #[test]
    fn test_windows_path_parts() {
        let p = r"C:\Users\u\hello.c";
        assert_eq!(dir_with_trailing_separator(p), r"C:\Users\u\");
        assert_eq!(dir_without_trailing_separator(p), r"C:\Users\u");
        assert_eq!(base_name(p), "hello.c");
        assert_eq!(file_stem(p), "hello");
    }

    #[test]
    fn test_mixed_separators_and_no_extension() {
        let p = r"C:\work/src\Makefile";
        assert_eq!(base_name(p), "Makefile");
        assert_eq!(file_stem(p), "Makefile");
        assert_eq!(extension(p), "");
        assert_eq!(dir_with_trailing_separator(p), r"C:\work/src\");
    }

    #[test]
    fn test_dotfile_has_no_extension() {
        assert_eq!(extension("/home/u/.bashrc"), "");
    }

    #[test]
    fn test_detect_shell_prefers_config() {
        let configured = "pwsh".to_string();
        assert_eq!(detect_shell(Some(&configured)), "pwsh");
    }
}
