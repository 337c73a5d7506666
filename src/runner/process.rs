use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::mpsc::UnboundedSender;
use crate::runner::SessionEvent;
use crate::runner::output::OutputSurface;
use crate::utils::system_shell;

/// Starts `command` through the system shell, in its own process group so the
/// whole tree can be killed later.
pub fn spawn_shell_command(
    command: &str,
    cwd: &Path,
    env_vars: &HashMap<String, String>,
) -> Result<Child> {
    let (shell, flag) = system_shell();

    let mut cmd = Command::new(shell);
    cmd.arg(flag);
    #[cfg(windows)]
    cmd.raw_arg(command);
    #[cfg(not(windows))]
    cmd.arg(command);

    cmd.current_dir(cwd)
        .envs(env_vars)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    #[cfg(unix)]
    cmd.process_group(0);

    cmd.spawn()
        .with_context(|| format!("Failed to spawn shell process: {}", command))
}

async fn pump<R: AsyncRead + Unpin>(mut reader: R, output: Arc<dyn OutputSurface>) {
    let mut buf = [0u8; 8192];
    let mut pending = Vec::new();
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                pending.extend_from_slice(&buf[..n]);
                let text = take_complete_utf8(&mut pending);
                if !text.is_empty() {
                    output.append(&text);
                }
            }
            Err(e) => {
                log::debug!("Output stream closed: {}", e);
                break;
            }
        }
    }
    if !pending.is_empty() {
        output.append(&String::from_utf8_lossy(&pending));
    }
}

/// Decodes every complete character in `pending`, leaving a trailing partial
/// sequence in place for the next read. Invalid bytes become U+FFFD.
fn take_complete_utf8(pending: &mut Vec<u8>) -> String {
    let mut text = String::new();
    loop {
        match std::str::from_utf8(&pending[..]) {
            Ok(valid) => {
                text.push_str(valid);
                pending.clear();
                return text;
            }
            Err(e) => {
                let valid_up_to = e.valid_up_to();
                text.push_str(&String::from_utf8_lossy(&pending[..valid_up_to]));
                match e.error_len() {
                    None => {
                        pending.drain(..valid_up_to);
                        return text;
                    }
                    Some(len) => {
                        text.push(char::REPLACEMENT_CHARACTER);
                        pending.drain(..valid_up_to + len);
                    }
                }
            }
        }
    }
}

/// Streams the child's stdout/stderr to `output` as chunks arrive, then posts
/// `ProcessExited` once both streams are drained and the child is reaped.
pub fn watch(
    mut child: Child,
    run_id: u64,
    temp_file: Option<PathBuf>,
    output: Arc<dyn OutputSurface>,
    events: UnboundedSender<SessionEvent>,
) {
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let out_sink = output.clone();
    let err_sink = output;

    tokio::spawn(async move {
        let out = async move {
            if let Some(stream) = stdout {
                pump(stream, out_sink).await;
            }
        };
        let err = async move {
            if let Some(stream) = stderr {
                pump(stream, err_sink).await;
            }
        };
        let (_, _, status) = tokio::join!(out, err, child.wait());

        let code = match status {
            Ok(status) => status.code(),
            Err(e) => {
                log::warn!("Failed to wait for run {}: {}", run_id, e);
                None
            }
        };
        // Session may already be gone
        let _ = events.send(SessionEvent::ProcessExited { run_id, code, temp_file });
    });
}

/// Forcibly terminates a process and all of its descendants.
#[cfg(unix)]
pub fn kill_tree(pid: u32) -> Result<()> {
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    killpg(Pid::from_raw(pid as i32), Signal::SIGKILL)
        .with_context(|| format!("Failed to kill process group {}", pid))
}

#[cfg(windows)]
pub fn kill_tree(pid: u32) -> Result<()> {
    let status = std::process::Command::new("taskkill")
        .args(["/PID", &pid.to_string(), "/T", "/F"])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .context("Failed to run taskkill")?;
    if !status.success() {
        anyhow::bail!("taskkill exited with code {:?}", status.code());
    }
    Ok(())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::runner::output::BufferedOutput;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_streams_and_reports_exit() {
        let dir = tempfile::tempdir().unwrap();
        let mut env_vars = HashMap::new();
        env_vars.insert("GREETING".to_string(), "hello".to_string());

        let child = spawn_shell_command("echo $GREETING; echo oops 1>&2; exit 3", dir.path(), &env_vars).unwrap();
        let output = Arc::new(BufferedOutput::default());
        let (tx, mut rx) = mpsc::unbounded_channel();
        watch(child, 7, None, output.clone(), tx);

        match rx.recv().await.unwrap() {
            SessionEvent::ProcessExited { run_id, code, temp_file } => {
                assert_eq!(run_id, 7);
                assert_eq!(code, Some(3));
                assert!(temp_file.is_none());
            }
            other => panic!("unexpected event: {:?}", other),
        }
        let text = output.contents();
        assert!(text.contains("hello"));
        assert!(text.contains("oops"));
    }

    #[test]
    fn test_partial_utf8_held_for_next_read() {
        let mut pending = b"ab\xc3".to_vec();
        assert_eq!(take_complete_utf8(&mut pending), "ab");
        assert_eq!(pending, b"\xc3");

        pending.extend_from_slice(b"\xa9!");
        assert_eq!(take_complete_utf8(&mut pending), "\u{e9}!");
        assert!(pending.is_empty());

        let mut invalid = b"x\xffy".to_vec();
        assert_eq!(take_complete_utf8(&mut invalid), "x\u{fffd}y");
        assert!(invalid.is_empty());
    }

    #[tokio::test]
    async fn test_multibyte_char_across_reads() {
        let dir = tempfile::tempdir().unwrap();
        let payload = format!("{}\u{e9}tail", "a".repeat(8191));
        std::fs::write(dir.path().join("wide.txt"), &payload).unwrap();

        let child = spawn_shell_command("cat wide.txt", dir.path(), &HashMap::new()).unwrap();
        let output = Arc::new(BufferedOutput::default());
        let (tx, mut rx) = mpsc::unbounded_channel();
        watch(child, 1, None, output.clone(), tx);
        rx.recv().await.unwrap();

        let got = output.contents();
        assert!(!got.contains(char::REPLACEMENT_CHARACTER));
        assert_eq!(got, payload);
    }

    #[tokio::test]
    async fn test_runs_in_cwd() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "found").unwrap();

        let child = spawn_shell_command("cat marker.txt", dir.path(), &HashMap::new()).unwrap();
        let output = Arc::new(BufferedOutput::default());
        let (tx, mut rx) = mpsc::unbounded_channel();
        watch(child, 1, None, output.clone(), tx);
        rx.recv().await.unwrap();
        assert_eq!(output.contents(), "found");
    }

    #[tokio::test]
    async fn test_kill_tree() {
        let dir = tempfile::tempdir().unwrap();
        let child = spawn_shell_command("sleep 30 & sleep 30", dir.path(), &HashMap::new()).unwrap();
        let pid = child.id().unwrap();
        let output = Arc::new(BufferedOutput::default());
        let (tx, mut rx) = mpsc::unbounded_channel();
        watch(child, 1, None, output, tx);

        kill_tree(pid).unwrap();
        let event = tokio::time::timeout(std::time::Duration::from_secs(5), rx.recv())
            .await
            .expect("process group should die promptly")
            .unwrap();
        assert!(matches!(event, SessionEvent::ProcessExited { code: None, .. }));
    }
}
