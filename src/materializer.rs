use anyhow::{Context, Result};
use rand::Rng;
use std::path::{Path, PathBuf};
use crate::config::RunnerConfig;
use crate::editor::{Document, Editor};

const PHP_OPEN_TAG: &str = "<?php";

/// The file handed to the executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeFile {
    pub path: PathBuf,
    /// Written for this run only; removed once the run reports completion.
    pub is_temporary: bool,
}

/// Decides which file the executor runs on, saving or writing it first.
///
/// Saved documents run from disk unless a selection isolates part of them.
/// Selections and untitled buffers go to a fresh temporary file next to the
/// document (or in `cwd` for untitled buffers).
pub async fn materialize(
    document: &Document,
    editor: &mut dyn Editor,
    config: &RunnerConfig,
    language_id: &str,
    file_extension: &str,
    cwd: &Path,
    run_from_file: bool,
) -> Result<CodeFile> {
    let use_whole_file = run_from_file || !document.has_selection() || config.ignore_selection;

    if let (Some(path), true) = (&document.path, use_whole_file) {
        if config.save_all_files_before_run {
            editor.save_all().await.context("Failed to save files before run")?;
        } else if config.save_file_before_run {
            editor.save(document).await.context("Failed to save file before run")?;
        }
        return Ok(CodeFile {
            path: path.clone(),
            is_temporary: false,
        });
    }

    let text = if config.ignore_selection {
        document.text.clone()
    } else {
        document.selected_text()
    };
    let text = normalize_snippet(language_id, &text);

    let folder = match document.path.as_deref().and_then(Path::parent) {
        Some(parent) => parent.to_path_buf(),
        None => cwd.to_path_buf(),
    };
    let path = temporary_file_path(config, &folder, language_id, file_extension);

    tokio::fs::write(&path, text.as_bytes())
        .await
        .with_context(|| format!("Failed to write temporary file {}", path.display()))?;
    log::debug!("Wrote snippet to {}", path.display());

    Ok(CodeFile {
        path,
        is_temporary: true,
    })
}

/// PHP snippets need an opening tag. Applying this twice changes nothing.
pub fn normalize_snippet(language_id: &str, text: &str) -> String {
    if language_id != "php" {
        return text.to_string();
    }
    let trimmed = text.trim();
    if trimmed.starts_with(PHP_OPEN_TAG) {
        trimmed.to_string()
    } else {
        format!("{}\r\n{}", PHP_OPEN_TAG, trimmed)
    }
}

pub fn temporary_file_path(
    config: &RunnerConfig,
    folder: &Path,
    language_id: &str,
    file_extension: &str,
) -> PathBuf {
    let extension = match config.language_id_to_file_extension_map.get(language_id) {
        Some(ext) if !ext.is_empty() => ext.clone(),
        _ if !file_extension.is_empty() => file_extension.to_string(),
        _ => format!(".{}", language_id),
    };

    let stem = match config.temporary_file_name.as_deref() {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => format!("temp{}", random_name(10)),
    };

    folder.join(format!("{}{}", stem, extension))
}

fn random_name(len: usize) -> String {
    let mut rng = rand::rng();
    (0..len).map(|_| rng.random_range(b'a'..=b'z') as char).collect()
}
