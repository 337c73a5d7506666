use anyhow::{Context, Result};
use colored::*;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "coderun.toml";

const DEFAULT_EXECUTORS: &[(&str, &str)] = &[
    ("javascript", "node"),
    ("java", "cd $dir && javac $fileName && java $fileNameWithoutExt"),
    ("c", "cd $dir && gcc $fileName -o $fileNameWithoutExt && $dir$fileNameWithoutExt"),
    ("cpp", "cd $dir && g++ $fileName -o $fileNameWithoutExt && $dir$fileNameWithoutExt"),
    ("objective-c", "cd $dir && gcc -framework Cocoa $fileName -o $fileNameWithoutExt && $dir$fileNameWithoutExt"),
    ("php", "php"),
    ("python", "python -u"),
    ("perl", "perl"),
    ("perl6", "perl6"),
    ("ruby", "ruby"),
    ("go", "go run"),
    ("lua", "lua"),
    ("groovy", "groovy"),
    ("powershell", "powershell -ExecutionPolicy ByPass -File"),
    ("bat", "cmd /c"),
    ("shellscript", "bash"),
    ("fsharp", "fsi"),
    ("csharp", "scriptcs"),
    ("vbscript", "cscript //Nologo"),
    ("typescript", "ts-node"),
    ("coffeescript", "coffee"),
    ("scala", "scala"),
    ("swift", "swift"),
    ("julia", "julia"),
    ("crystal", "crystal"),
    ("ocaml", "ocaml"),
    ("r", "Rscript"),
    ("applescript", "osascript"),
    ("clojure", "lein exec"),
    ("haxe", "haxe --cwd $dirWithoutTrailingSlash --run $fileNameWithoutExt"),
    ("rust", "cd $dir && rustc $fileName && $dir$fileNameWithoutExt"),
    ("racket", "racket"),
    ("scheme", "csi -script"),
    ("ahk", "autohotkey"),
    ("autoit", "autoit3"),
    ("dart", "dart"),
    ("pascal", "cd $dir && fpc $fileName && $dir$fileNameWithoutExt"),
    ("d", "cd $dir && dmd $fileName && $dir$fileNameWithoutExt"),
    ("haskell", "runghc"),
    ("nim", "nim compile --verbosity:0 --hints:off --run"),
    ("lisp", "sbcl --script"),
    ("kit", "kitc --run"),
    ("v", "v run"),
    ("sass", "sass --style expanded"),
    ("scss", "scss --style expanded"),
    ("less", "cd $dir && lessc $fileName $fileNameWithoutExt.css"),
    ("FortranFreeForm", "cd $dir && gfortran $fileName -o $fileNameWithoutExt && $dir$fileNameWithoutExt"),
    ("fortran", "cd $dir && gfortran $fileName -o $fileNameWithoutExt && $dir$fileNameWithoutExt"),
    ("sml", "cd $dir && sml $fileName"),
    ("zig", "zig run"),
    ("elixir", "elixir"),
    ("kotlin", "cd $dir && kotlinc $fileName -include-runtime -d $fileNameWithoutExt.jar && java -jar $fileNameWithoutExt.jar"),
];

const DEFAULT_EXECUTORS_BY_EXTENSION: &[(&str, &str)] = &[
    (".vb", "cd $dir && vbc /nologo $fileName && $dir$fileNameWithoutExt"),
    (".vbs", "cscript //Nologo"),
    (".scala", "scala"),
    (".jl", "julia"),
    (".cr", "crystal"),
    (".ml", "ocaml"),
    (".zig", "zig run"),
    (".exs", "elixir"),
    (".hx", "haxe --cwd $dirWithoutTrailingSlash --run $fileNameWithoutExt"),
    (".rkt", "racket"),
    (".scm", "csi -script"),
    (".ahk", "autohotkey"),
    (".au3", "autoit3"),
    (".kt", "cd $dir && kotlinc $fileName -include-runtime -d $fileNameWithoutExt.jar && java -jar $fileNameWithoutExt.jar"),
    (".kts", "kotlinc -script"),
    (".dart", "dart"),
    (".pp", "cd $dir && fpc $fileName && $dir$fileNameWithoutExt"),
    (".pas", "cd $dir && fpc $fileName && $dir$fileNameWithoutExt"),
    (".pascal", "cd $dir && fpc $fileName && $dir$fileNameWithoutExt"),
    (".d", "cd $dir && dmd $fileName && $dir$fileNameWithoutExt"),
    (".hs", "runhaskell"),
    (".nim", "nim compile --verbosity:0 --hints:off --run"),
    (".csproj", "dotnet run --project"),
    (".fsproj", "dotnet run --project"),
    (".lisp", "sbcl --script"),
    (".kit", "kitc --run"),
    (".v", "v run"),
    (".vsh", "v run"),
    (".sass", "sass --style expanded"),
    (".cu", "cd $dir && nvcc $fileName -o $fileNameWithoutExt && $dir$fileNameWithoutExt"),
    (".ring", "ring"),
    (".sml", "cd $dir && sml $fileName"),
];

const DEFAULT_LANGUAGE_EXTENSIONS: &[(&str, &str)] = &[
    ("bat", ".bat"),
    ("powershell", ".ps1"),
    ("typescript", ".ts"),
];

/// Settings consulted by every stage of a run.
///
/// Mirrors the keyed settings store of an editor: built-in defaults, overlaid by
/// `coderun.toml`, overlaid by `.env` for the process environment.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub executor_map: HashMap<String, String>,
    pub executor_map_by_file_extension: HashMap<String, String>,
    pub executor_map_by_glob: BTreeMap<String, String>,
    pub language_id_to_file_extension_map: HashMap<String, String>,
    pub default_language: Option<String>,
    pub custom_command: Option<String>,
    pub cwd: Option<PathBuf>,
    pub file_directory_as_cwd: bool,
    pub ignore_selection: bool,
    pub save_all_files_before_run: bool,
    pub save_file_before_run: bool,
    pub run_in_terminal: bool,
    pub preserve_focus: bool,
    pub clear_previous_output: bool,
    pub show_execution_message: bool,
    pub terminal_root: Option<String>,
    pub respect_shebang: bool,
    pub temporary_file_name: Option<String>,
    /// Interactive shell name; used for platform adaptation and terminal sessions.
    pub shell: Option<String>,
    pub env: HashMap<String, String>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            executor_map: to_map(DEFAULT_EXECUTORS),
            executor_map_by_file_extension: to_map(DEFAULT_EXECUTORS_BY_EXTENSION),
            executor_map_by_glob: BTreeMap::new(),
            language_id_to_file_extension_map: to_map(DEFAULT_LANGUAGE_EXTENSIONS),
            default_language: None,
            custom_command: None,
            cwd: None,
            file_directory_as_cwd: false,
            ignore_selection: false,
            save_all_files_before_run: false,
            save_file_before_run: false,
            run_in_terminal: false,
            preserve_focus: true,
            clear_previous_output: false,
            show_execution_message: true,
            terminal_root: None,
            respect_shebang: true,
            temporary_file_name: None,
            shell: None,
            env: HashMap::new(),
        }
    }
}

/// On-disk shape of `coderun.toml`. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConfigFile {
    pub executor_map: HashMap<String, String>,
    pub executor_map_by_file_extension: HashMap<String, String>,
    pub executor_map_by_glob: BTreeMap<String, String>,
    pub language_id_to_file_extension_map: HashMap<String, String>,
    pub default_language: Option<String>,
    pub custom_command: Option<String>,
    pub cwd: Option<PathBuf>,
    pub file_directory_as_cwd: Option<bool>,
    pub ignore_selection: Option<bool>,
    pub save_all_files_before_run: Option<bool>,
    pub save_file_before_run: Option<bool>,
    pub run_in_terminal: Option<bool>,
    pub preserve_focus: Option<bool>,
    pub clear_previous_output: Option<bool>,
    pub show_execution_message: Option<bool>,
    pub terminal_root: Option<String>,
    pub respect_shebang: Option<bool>,
    pub temporary_file_name: Option<String>,
    pub shell: Option<String>,
    pub env: HashMap<String, String>,
}

impl RunnerConfig {
    /// Overlays a parsed config file. Map entries merge per key, scalars replace.
    pub fn merge(&mut self, file: ConfigFile) {
        self.executor_map.extend(file.executor_map);
        self.executor_map_by_file_extension.extend(file.executor_map_by_file_extension);
        self.executor_map_by_glob.extend(file.executor_map_by_glob);
        self.language_id_to_file_extension_map.extend(file.language_id_to_file_extension_map);
        self.env.extend(file.env);

        if file.default_language.is_some() {
            self.default_language = file.default_language;
        }
        if file.custom_command.is_some() {
            self.custom_command = file.custom_command;
        }
        if file.cwd.is_some() {
            self.cwd = file.cwd;
        }
        if file.terminal_root.is_some() {
            self.terminal_root = file.terminal_root;
        }
        if file.temporary_file_name.is_some() {
            self.temporary_file_name = file.temporary_file_name;
        }
        if file.shell.is_some() {
            self.shell = file.shell;
        }

        let flags = [
            (file.file_directory_as_cwd, &mut self.file_directory_as_cwd),
            (file.ignore_selection, &mut self.ignore_selection),
            (file.save_all_files_before_run, &mut self.save_all_files_before_run),
            (file.save_file_before_run, &mut self.save_file_before_run),
            (file.run_in_terminal, &mut self.run_in_terminal),
            (file.preserve_focus, &mut self.preserve_focus),
            (file.clear_previous_output, &mut self.clear_previous_output),
            (file.show_execution_message, &mut self.show_execution_message),
            (file.respect_shebang, &mut self.respect_shebang),
        ];
        for (value, slot) in flags {
            if let Some(v) = value {
                *slot = v;
            }
        }
    }

    /// Executor for a language id. Empty templates count as unset.
    pub fn executor_for_language(&self, language_id: &str) -> Option<&str> {
        non_empty(self.executor_map.get(language_id))
    }

    pub fn executor_for_extension(&self, extension: &str) -> Option<&str> {
        non_empty(self.executor_map_by_file_extension.get(extension))
    }

    pub fn custom_command(&self) -> Option<&str> {
        self.custom_command.as_deref().filter(|c| !c.trim().is_empty())
    }
}

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|v| !v.is_empty())
}

fn to_map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

pub fn load_config(dir: &Path) -> Result<RunnerConfig> {
    let mut config = RunnerConfig::default();

    // 1. coderun.toml (optional; defaults stand alone)
    let config_path = dir.join(CONFIG_FILE);
    if config_path.exists() {
        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read {}", CONFIG_FILE))?;
        let file: ConfigFile = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", CONFIG_FILE))?;
        config.merge(file);
        log::debug!("Loaded settings from {}", config_path.display());
    }

    // Relative cwd is anchored at the config directory
    if let Some(cwd) = &config.cwd {
        if cwd.is_relative() {
            config.cwd = Some(dir.join(cwd));
        }
    }

    // 2. .env override layer for the spawned processes
    let env_filename = env::var("CODERUN_ENV")
        .map(|v| format!(".env.{}", v))
        .unwrap_or_else(|_| ".env".to_string());

    let env_path = dir.join(&env_filename);

    if env_path.exists() {
        eprintln!("{} Loading environment from: {}", "🌿".green(), env_filename.bold());

        for item in dotenvy::from_path_iter(&env_path)? {
            let (key, val) = item?;
            config.env.insert(key, val);
        }
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(dir.path()).unwrap();
        assert_eq!(config.executor_for_language("python"), Some("python -u"));
        assert!(config.preserve_focus);
        assert!(config.show_execution_message);
        assert!(!config.run_in_terminal);
        assert_eq!(config.language_id_to_file_extension_map["typescript"], ".ts");
    }

    #[test]
    fn test_file_merges_over_defaults() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE),
            r#"
runInTerminal = true
showExecutionMessage = false
defaultLanguage = "python"
cwd = "build"

[executorMap]
python = "python3 $fullFileName"
javascript = ""

[executorMapByGlob]
"*.test.js" = "jest"

[env]
GREETING = "hi"
"#,
        )
        .unwrap();
        fs::write(dir.path().join(".env"), "GREETING=hello\nTOKEN=abc\n").unwrap();

        let config = load_config(dir.path()).unwrap();
        assert!(config.run_in_terminal);
        assert!(!config.show_execution_message);
        assert!(config.preserve_focus);
        assert_eq!(config.default_language.as_deref(), Some("python"));
        assert_eq!(config.cwd, Some(dir.path().join("build")));
        assert_eq!(config.executor_for_language("python"), Some("python3 $fullFileName"));
        assert_eq!(config.executor_for_language("javascript"), None);
        assert_eq!(config.executor_for_language("ruby"), Some("ruby"));
        assert_eq!(config.executor_map_by_glob["*.test.js"], "jest");
        assert_eq!(config.env["GREETING"], "hello");
        assert_eq!(config.env["TOKEN"], "abc");
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILE), "runInTerminal = \"yes\"").unwrap();
        assert!(load_config(dir.path()).is_err());
    }

    #[test]
    fn test_blank_custom_command_is_unset() {
        let mut config = RunnerConfig::default();
        config.custom_command = Some("   ".to_string());
        assert_eq!(config.custom_command(), None);
        config.custom_command = Some("make run".to_string());
        assert_eq!(config.custom_command(), Some("make run"));
    }
}
