//! Bounded subprocess execution shared by every external-tool adapter.

use crate::engines::EngineFailure;
use std::io::Read;
use std::process::{Command, Stdio};
use std::time::Duration;
use tracing::debug;
use wait_timeout::ChildExt;

#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

/// Run a command with piped output and a hard timeout. A timed-out child is
/// killed and reaped before the failure is returned. Exit-code policy is left
/// to the caller; only spawn/wait problems are failures here.
pub fn run_with_timeout(
    tool: &'static str,
    mut command: Command,
    timeout: Duration,
) -> Result<CommandOutput, EngineFailure> {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    debug!(tool, ?timeout, "spawning external engine");

    let mut child = command.spawn().map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            EngineFailure::ToolMissing { tool }
        } else {
            EngineFailure::Execution {
                tool,
                detail: e.to_string(),
            }
        }
    })?;

    // Drain both pipes on background threads so a chatty tool cannot fill the
    // pipe buffer and deadlock against wait().
    let stdout_handle = child.stdout.take().map(spawn_reader);
    let stderr_handle = child.stderr.take().map(spawn_reader);

    let status = match child.wait_timeout(timeout).map_err(|e| EngineFailure::Execution {
        tool,
        detail: e.to_string(),
    })? {
        Some(status) => status,
        None => {
            let _ = child.kill();
            let _ = child.wait();
            join_reader(stdout_handle);
            join_reader(stderr_handle);
            return Err(EngineFailure::Timeout {
                tool,
                seconds: timeout.as_secs(),
            });
        }
    };

    let stdout = join_reader(stdout_handle);
    let stderr = join_reader(stderr_handle);

    Ok(CommandOutput {
        exit_code: status.code().unwrap_or(-1),
        stdout,
        stderr,
    })
}

fn spawn_reader<R: Read + Send + 'static>(mut source: R) -> std::thread::JoinHandle<String> {
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = source.read_to_end(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    })
}

fn join_reader(handle: Option<std::thread::JoinHandle<String>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .unwrap_or_default()
}
