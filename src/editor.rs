use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use colored::*;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use crate::utils::extension;

/// Inclusive, 1-based line range selected in a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub start_line: usize,
    pub end_line: usize,
}

impl Selection {
    pub fn new(start_line: usize, end_line: usize) -> Self {
        Self { start_line, end_line }
    }

    pub fn is_empty(&self) -> bool {
        self.start_line == 0 || self.end_line < self.start_line
    }

    /// Parses `A:B` or a single line `A`.
    pub fn parse(range: &str) -> Result<Self> {
        let (start, end) = match range.split_once(':') {
            Some((s, e)) => (s, e),
            None => (range, range),
        };
        let start = start.trim().parse().with_context(|| format!("Invalid line range: {}", range))?;
        let end = end.trim().parse().with_context(|| format!("Invalid line range: {}", range))?;
        let selection = Self::new(start, end);
        if selection.is_empty() {
            bail!("Invalid line range: {}", range);
        }
        Ok(selection)
    }
}

/// A buffer as the editor sees it.
#[derive(Debug, Clone)]
pub struct Document {
    /// Backing file; `None` for untitled buffers.
    pub path: Option<PathBuf>,
    pub language_id: String,
    pub text: String,
    pub selection: Option<Selection>,
    pub is_dirty: bool,
}

impl Document {
    pub fn is_untitled(&self) -> bool {
        self.path.is_none()
    }

    /// Display name used for extension and glob lookups.
    pub fn file_name(&self) -> String {
        match &self.path {
            Some(path) => path.to_string_lossy().into_owned(),
            None => "Untitled-1".to_string(),
        }
    }

    pub fn file_extension(&self) -> String {
        extension(&self.file_name()).to_string()
    }

    pub fn first_line(&self) -> &str {
        self.text.lines().next().unwrap_or("")
    }

    pub fn has_selection(&self) -> bool {
        self.selection.is_some_and(|s| !s.is_empty())
    }

    /// Text covered by the selection, or the whole buffer when nothing is selected.
    pub fn selected_text(&self) -> String {
        match self.selection.filter(|s| !s.is_empty()) {
            Some(sel) => self
                .text
                .lines()
                .skip(sel.start_line - 1)
                .take(sel.end_line - sel.start_line + 1)
                .collect::<Vec<_>>()
                .join("\n"),
            None => self.text.clone(),
        }
    }
}

/// Editor collaborator: documents, saving and user notices.
#[async_trait]
pub trait Editor: Send {
    fn active_document(&self) -> Option<Document>;
    async fn open_document(&mut self, path: &Path) -> Result<Document>;
    async fn save(&mut self, document: &Document) -> Result<()>;
    async fn save_all(&mut self) -> Result<()>;
    fn workspace_root(&self) -> Option<PathBuf>;
    fn notify(&self, message: &str);
}

const LANGUAGE_BY_EXTENSION: &[(&str, &str)] = &[
    (".js", "javascript"),
    (".mjs", "javascript"),
    (".ts", "typescript"),
    (".java", "java"),
    (".c", "c"),
    (".h", "c"),
    (".cpp", "cpp"),
    (".cc", "cpp"),
    (".cxx", "cpp"),
    (".m", "objective-c"),
    (".php", "php"),
    (".py", "python"),
    (".pl", "perl"),
    (".rb", "ruby"),
    (".go", "go"),
    (".lua", "lua"),
    (".groovy", "groovy"),
    (".ps1", "powershell"),
    (".bat", "bat"),
    (".cmd", "bat"),
    (".sh", "shellscript"),
    (".bash", "shellscript"),
    (".fsx", "fsharp"),
    (".cs", "csharp"),
    (".csx", "csharp"),
    (".vbs", "vbscript"),
    (".coffee", "coffeescript"),
    (".scala", "scala"),
    (".swift", "swift"),
    (".jl", "julia"),
    (".cr", "crystal"),
    (".ml", "ocaml"),
    (".r", "r"),
    (".R", "r"),
    (".applescript", "applescript"),
    (".clj", "clojure"),
    (".hx", "haxe"),
    (".rs", "rust"),
    (".rkt", "racket"),
    (".scm", "scheme"),
    (".dart", "dart"),
    (".pas", "pascal"),
    (".d", "d"),
    (".hs", "haskell"),
    (".nim", "nim"),
    (".lisp", "lisp"),
    (".v", "v"),
    (".scss", "scss"),
    (".sass", "sass"),
    (".less", "less"),
    (".f90", "FortranFreeForm"),
    (".f", "fortran"),
    (".sml", "sml"),
    (".zig", "zig"),
    (".ex", "elixir"),
    (".exs", "elixir"),
    (".kt", "kotlin"),
];

/// Language id the way an editor would guess it from the file name.
pub fn language_for_path(path: &Path) -> String {
    let name = path.to_string_lossy();
    let ext = extension(&name);
    LANGUAGE_BY_EXTENSION
        .iter()
        .find(|(e, _)| *e == ext)
        .map(|(_, id)| id.to_string())
        .unwrap_or_else(|| "plaintext".to_string())
}

/// Command-line stand-in for an editor: documents come from files or stdin.
pub struct FileEditor {
    active: Option<Document>,
    open: HashMap<PathBuf, Document>,
    workspace_root: Option<PathBuf>,
}

impl FileEditor {
    pub fn new(workspace_root: Option<PathBuf>) -> Self {
        Self {
            active: None,
            open: HashMap::new(),
            workspace_root,
        }
    }

    /// Loads a file and makes it the active document.
    pub fn open_file(&mut self, path: &Path, selection: Option<Selection>) -> Result<()> {
        let mut document = load_document(path)?;
        document.selection = selection;
        self.track(&document);
        self.active = Some(document);
        Ok(())
    }

    fn track(&mut self, document: &Document) {
        if let Some(path) = &document.path {
            self.open.insert(path.clone(), document.clone());
        }
    }

    /// Makes an untitled buffer the active document.
    pub fn open_untitled(&mut self, text: String, language_id: &str, selection: Option<Selection>) {
        self.active = Some(Document {
            path: None,
            language_id: language_id.to_string(),
            text,
            selection,
            is_dirty: true,
        });
    }
}

fn load_document(path: &Path) -> Result<Document> {
    let path = path
        .canonicalize()
        .with_context(|| format!("File not found: {}", path.display()))?;
    let text = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(Document {
        language_id: language_for_path(&path),
        path: Some(path),
        text,
        selection: None,
        is_dirty: false,
    })
}

async fn write_back(document: &Document) -> Result<()> {
    if let (Some(path), true) = (&document.path, document.is_dirty) {
        tokio::fs::write(path, &document.text)
            .await
            .with_context(|| format!("Failed to save {}", path.display()))?;
    }
    Ok(())
}

#[async_trait]
impl Editor for FileEditor {
    fn active_document(&self) -> Option<Document> {
        self.active.clone()
    }

    async fn open_document(&mut self, path: &Path) -> Result<Document> {
        let document = load_document(path)?;
        self.track(&document);
        Ok(document)
    }

    async fn save(&mut self, document: &Document) -> Result<()> {
        if document.is_untitled() {
            bail!("Untitled buffer has no file to save to");
        }
        write_back(document).await?;
        if let Some(path) = &document.path {
            if let Some(open) = self.open.get_mut(path) {
                open.is_dirty = false;
            }
        }
        Ok(())
    }

    async fn save_all(&mut self) -> Result<()> {
        for document in self.open.values_mut() {
            write_back(document).await?;
            document.is_dirty = false;
        }
        Ok(())
    }

    fn workspace_root(&self) -> Option<PathBuf> {
        self.workspace_root.clone()
    }

    fn notify(&self, message: &str) {
        eprintln!("{} {}", "ℹ".cyan(), message.yellow());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(text: &str, selection: Option<Selection>) -> Document {
        Document {
            path: Some(PathBuf::from("/tmp/x.py")),
            language_id: "python".to_string(),
            text: text.to_string(),
            selection,
            is_dirty: false,
        }
    }

    #[test]
    fn test_selection_parse() {
        assert_eq!(Selection::parse("3:5").unwrap(), Selection::new(3, 5));
        assert_eq!(Selection::parse("7").unwrap(), Selection::new(7, 7));
        assert!(Selection::parse("5:3").is_err());
        assert!(Selection::parse("0:1").is_err());
        assert!(Selection::parse("a:b").is_err());
    }

    #[test]
    fn test_selected_text() {
        let d = doc("one\ntwo\nthree\nfour", Some(Selection::new(2, 3)));
        assert!(d.has_selection());
        assert_eq!(d.selected_text(), "two\nthree");

        let whole = doc("one\ntwo", None);
        assert!(!whole.has_selection());
        assert_eq!(whole.selected_text(), "one\ntwo");
    }

    #[test]
    fn test_untitled_document() {
        let mut editor = FileEditor::new(None);
        editor.open_untitled("print(1)".to_string(), "python", None);
        let d = editor.active_document().unwrap();
        assert!(d.is_untitled());
        assert_eq!(d.file_extension(), "");
    }

    #[test]
    fn test_language_for_path() {
        assert_eq!(language_for_path(Path::new("/a/main.rs")), "rust");
        assert_eq!(language_for_path(Path::new("/a/script.py")), "python");
        assert_eq!(language_for_path(Path::new("/a/notes")), "plaintext");
    }

    #[tokio::test]
    async fn test_open_and_save() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("hello.rb");
        std::fs::write(&file, "puts 1").unwrap();

        let mut editor = FileEditor::new(Some(dir.path().to_path_buf()));
        editor.open_file(&file, None).unwrap();
        let mut d = editor.active_document().unwrap();
        assert_eq!(d.language_id, "ruby");
        assert_eq!(d.file_extension(), ".rb");

        d.text = "puts 2".to_string();
        d.is_dirty = true;
        editor.save(&d).await.unwrap();
        assert_eq!(std::fs::read_to_string(&file).unwrap(), "puts 2");
    }
}
