use glob::Pattern;
use crate::config::RunnerConfig;
use crate::editor::Document;
use crate::utils::base_name;

/// Executor chosen for a run, with the language id it ended up under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedExecutor {
    pub language_id: String,
    pub executor: String,
}

impl ResolvedExecutor {
    fn new(language_id: &str, executor: &str) -> Self {
        Self {
            language_id: language_id.to_string(),
            executor: executor.to_string(),
        }
    }
}

/// Looks up the executor template for a document.
///
/// Order: shebang line (only when no language was forced), glob map on the base
/// file name, language map, extension map, then the default language.
/// `None` means the language is not supported.
pub fn resolve_executor(
    config: &RunnerConfig,
    document: &Document,
    language_override: Option<&str>,
    file_extension: &str,
) -> Option<ResolvedExecutor> {
    let language_id = language_override.unwrap_or(document.language_id.as_str());

    if language_override.is_none() && config.respect_shebang {
        if let Some(executor) = shebang_executor(document.first_line()) {
            log::debug!("Using shebang executor: {}", executor);
            return Some(ResolvedExecutor::new(language_id, executor));
        }
    }

    let file_name = document.file_name();
    let base = base_name(&file_name);
    for (glob, executor) in &config.executor_map_by_glob {
        match Pattern::new(glob) {
            Ok(pattern) if pattern.matches(base) && !executor.is_empty() => {
                log::debug!("File {} matched glob {}", base, glob);
                return Some(ResolvedExecutor::new(language_id, executor));
            }
            Ok(_) => {}
            Err(e) => log::warn!("Ignoring invalid executor glob '{}': {}", glob, e),
        }
    }

    if let Some(executor) = config.executor_for_language(language_id) {
        return Some(ResolvedExecutor::new(language_id, executor));
    }

    if !file_extension.is_empty() {
        if let Some(executor) = config.executor_for_extension(file_extension) {
            return Some(ResolvedExecutor::new(file_extension, executor));
        }
    }

    let default_language = config.default_language.as_deref()?;
    config
        .executor_for_language(default_language)
        .map(|executor| ResolvedExecutor::new(default_language, executor))
}

/// `#!/usr/bin/env python3` yields `/usr/bin/env python3`. Rust's `#![...]` is not a shebang.
fn shebang_executor(first_line: &str) -> Option<&str> {
    let rest = first_line.strip_prefix("#!")?;
    if rest.starts_with('[') {
        return None;
    }
    let executor = rest.trim();
    (!executor.is_empty()).then_some(executor)
}
