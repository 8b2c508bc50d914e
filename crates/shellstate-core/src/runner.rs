//! Shell-backed [`CommandRunner`] with per-key in-flight coalescing.
//!
//! Every request executes `bash -lc <command>` with a wall-clock budget.
//! Requests carrying the same dedupe key share a single execution: late
//! callers await the pending result instead of spawning a duplicate process,
//! and the entry is dropped once it resolves so the next call runs fresh.

use std::{
    collections::HashMap,
    process::Stdio,
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use futures::{
    FutureExt,
    future::{BoxFuture, Shared},
};
use log::{debug, warn};
use shellstate_proto::ports::{CommandError, CommandFuture, CommandRequest, CommandRunner};
use tokio::{process::Command, time};

type SharedExecution = Shared<BoxFuture<'static, Result<String, CommandError>>>;

/// Quotes a value for safe interpolation into a `bash -lc` command line.
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Executes shell commands, coalescing concurrent invocations per dedupe key.
#[derive(Clone, Default)]
pub struct ShellRunner {
    in_flight: Arc<Mutex<HashMap<String, SharedExecution>>>,
}

impl ShellRunner {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_in_flight(&self) -> MutexGuard<'_, HashMap<String, SharedExecution>> {
        match self.in_flight.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

async fn execute(
    command: String,
    timeout: Duration,
    allow_failure: bool,
) -> Result<String, CommandError> {
    let trimmed = command.trim();
    if trimmed.is_empty() {
        return Err(CommandError::Empty);
    }

    debug!("executing command: {trimmed}");

    let output = Command::new("bash")
        .arg("-lc")
        .arg(trimmed)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output();

    let result = if timeout.is_zero() {
        output.await
    } else {
        match time::timeout(timeout, output).await {
            Ok(result) => result,
            Err(_) => {
                if allow_failure {
                    return Ok(String::new());
                }
                return Err(CommandError::Timeout { timeout });
            }
        }
    };

    match result {
        Ok(output) if output.status.success() => {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        }
        Ok(output) => {
            if allow_failure {
                return Ok(String::new());
            }
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(CommandError::failed(stderr.as_ref()))
        }
        Err(err) => {
            if allow_failure {
                return Ok(String::new());
            }
            Err(CommandError::Spawn {
                context: err.to_string(),
            })
        }
    }
}

impl CommandRunner for ShellRunner {
    fn run(&self, request: CommandRequest) -> CommandFuture<'_> {
        let CommandRequest {
            command,
            timeout,
            allow_failure,
            dedupe_key,
        } = request;

        let Some(key) = dedupe_key else {
            return execute(command, timeout, allow_failure).boxed();
        };

        let shared = {
            let mut in_flight = self.lock_in_flight();

            if let Some(existing) = in_flight.get(&key) {
                debug!("coalescing command under key `{key}`");
                existing.clone()
            } else {
                let map = Arc::clone(&self.in_flight);
                let cleanup_key = key.clone();

                let execution = async move {
                    let result = execute(command, timeout, allow_failure).await;

                    // The entry stays in the map until the underlying
                    // execution resolves, so every concurrent caller that
                    // looked it up shares this result.
                    match map.lock() {
                        Ok(mut in_flight) => {
                            in_flight.remove(&cleanup_key);
                        }
                        Err(poisoned) => {
                            warn!("in-flight map poisoned while cleaning `{cleanup_key}`");
                            poisoned.into_inner().remove(&cleanup_key);
                        }
                    }

                    result
                }
                .boxed()
                .shared();

                in_flight.insert(key, execution.clone());
                execution
            }
        };

        shared.boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::runtime::Runtime;

    fn append_command(path: &std::path::Path) -> String {
        format!("echo run >> {}; sleep 0.2; echo done", shell_quote(&path.display().to_string()))
    }

    #[test]
    fn concurrent_callers_share_one_execution() {
        let runtime = Runtime::new().expect("runtime");
        let dir = tempfile::tempdir().expect("tempdir");
        let marker = dir.path().join("marker");
        let runner = ShellRunner::new();

        let (a, b, c) = runtime.block_on(async {
            let request = || {
                CommandRequest::new(append_command(&marker))
                    .timeout(Duration::from_secs(5))
                    .dedupe_key("marker")
            };

            tokio::join!(
                runner.run(request()),
                runner.run(request()),
                runner.run(request())
            )
        });

        assert_eq!(a.as_deref().map(str::trim), Ok("done"));
        assert_eq!(a, b);
        assert_eq!(b, c);

        let runs = std::fs::read_to_string(&marker).expect("marker file");
        assert_eq!(runs.lines().count(), 1);
    }

    #[test]
    fn key_is_released_after_completion() {
        let runtime = Runtime::new().expect("runtime");
        let dir = tempfile::tempdir().expect("tempdir");
        let marker = dir.path().join("marker");
        let runner = ShellRunner::new();

        runtime.block_on(async {
            for _ in 0..2 {
                let request = CommandRequest::new(append_command(&marker))
                    .timeout(Duration::from_secs(5))
                    .dedupe_key("marker");
                runner.run(request).await.expect("command should succeed");
            }
        });

        let runs = std::fs::read_to_string(&marker).expect("marker file");
        assert_eq!(runs.lines().count(), 2);
    }

    #[test]
    fn allow_failure_masks_non_zero_exit() {
        let runtime = Runtime::new().expect("runtime");
        let runner = ShellRunner::new();

        let result = runtime.block_on(
            runner.run(CommandRequest::new("echo boom >&2; exit 3").allow_failure()),
        );
        assert_eq!(result, Ok(String::new()));
    }

    #[test]
    fn non_zero_exit_surfaces_stderr() {
        let runtime = Runtime::new().expect("runtime");
        let runner = ShellRunner::new();

        let result = runtime.block_on(runner.run(CommandRequest::new("echo boom >&2; exit 3")));
        assert_eq!(
            result,
            Err(CommandError::Failed {
                message: "boom".into()
            })
        );
    }

    #[test]
    fn timeout_is_enforced() {
        let runtime = Runtime::new().expect("runtime");
        let runner = ShellRunner::new();

        let result = runtime.block_on(
            runner.run(CommandRequest::new("sleep 5").timeout(Duration::from_millis(100))),
        );
        assert!(matches!(result, Err(CommandError::Timeout { .. })));
    }

    #[test]
    fn empty_command_is_rejected() {
        let runtime = Runtime::new().expect("runtime");
        let runner = ShellRunner::new();

        let result = runtime.block_on(runner.run(CommandRequest::new("   ")));
        assert_eq!(result, Err(CommandError::Empty));
    }

    #[test]
    fn quoting_survives_embedded_single_quotes() {
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
    }
}
