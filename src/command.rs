use std::path::Path;
use crate::utils::{base_name, dir_with_trailing_separator, dir_without_trailing_separator, file_stem, quote};

/// Substitutes path placeholders into an executor template.
///
/// Placeholders are replaced everywhere they occur. Names that prefix other names
/// (`$fileName`, `$dir`) are applied after the longer ones.
/// Fallback: if the template has no placeholder, the quoted code file is appended
/// when `append_file` is set.
pub fn build_command(
    template: &str,
    code_file: Option<&Path>,
    workspace_root: Option<&Path>,
    append_file: bool,
) -> String {
    let Some(code_file) = code_file else {
        return template.to_string();
    };

    let file = code_file.to_string_lossy();
    let dir = dir_with_trailing_separator(&file);
    let workspace = workspace_root
        .map(|root| root.to_string_lossy().into_owned())
        .unwrap_or_else(|| dir.to_string());

    let placeholders = [
        ("$workspaceRoot", workspace),
        ("$fileNameWithoutExt", file_stem(&file).to_string()),
        ("$fullFileName", quote(&file)),
        ("$fileName", base_name(&file).to_string()),
        ("$dirWithoutTrailingSlash", quote(dir_without_trailing_separator(&file))),
        ("$dir", quote(dir)),
    ];

    let mut cmd = template.to_string();
    for (pattern, value) in &placeholders {
        if cmd.contains(pattern) {
            cmd = cmd.replace(pattern, value);
        }
    }

    if cmd != template {
        return cmd;
    }

    // No placeholder matched
    if append_file {
        cmd.push(' ');
        cmd.push_str(&quote(&file));
    }
    cmd
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_file_name() {
        let cmd = build_command("python $fullFileName", Some(Path::new("/home/u/a.py")), None, true);
        assert_eq!(cmd, r#"python "/home/u/a.py""#);
    }

    #[test]
    fn test_append_when_no_placeholder() {
        let file = Path::new("/home/u/a.py");
        assert_eq!(build_command("python -u", Some(file), None, true), r#"python -u "/home/u/a.py""#);
        assert_eq!(build_command("python -u", Some(file), None, false), "python -u");
    }

    #[test]
    fn test_placeholder_ignores_append_flag() {
        let file = Path::new("/src/hello.rb");
        let with = build_command("ruby $fileName", Some(file), None, true);
        let without = build_command("ruby $fileName", Some(file), None, false);
        assert_eq!(with, "ruby hello.rb");
        assert_eq!(with, without);
    }

    #[test]
    fn test_compile_chain() {
        let cmd = build_command(
            "cd $dir && gcc $fileName -o $fileNameWithoutExt && $dir$fileNameWithoutExt",
            Some(Path::new("/tmp/x/hello.c")),
            None,
            true,
        );
        assert_eq!(
            cmd,
            r#"cd "/tmp/x/" && gcc hello.c -o hello && "/tmp/x/"hello"#
        );
    }

    #[test]
    fn test_directory_variants_with_backslashes() {
        let cmd = build_command(
            "haxe --cwd $dirWithoutTrailingSlash --run $fileNameWithoutExt",
            Some(Path::new(r"C:\code\Main.hx")),
            None,
            true,
        );
        assert_eq!(cmd, r#"haxe --cwd "C:\code" --run Main"#);
    }

    #[test]
    fn test_workspace_root() {
        let file = Path::new("/repo/src/main.go");
        assert_eq!(
            build_command("cd $workspaceRoot && go run .", Some(file), Some(Path::new("/repo")), true),
            "cd /repo && go run ."
        );
        assert_eq!(
            build_command("cd $workspaceRoot && go run .", Some(file), None, true),
            "cd /repo/src/ && go run ."
        );
    }

    #[test]
    fn test_every_occurrence_is_replaced() {
        let cmd = build_command("echo $fileName $fileName", Some(Path::new("/a/b.txt")), None, true);
        assert_eq!(cmd, "echo b.txt b.txt");
    }

    #[test]
    fn test_without_code_file() {
        assert_eq!(build_command("make $fileName", None, None, true), "make $fileName");
        assert_eq!(build_command("make", None, None, false), "make");
    }
}
