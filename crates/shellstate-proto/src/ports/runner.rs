use std::{future::Future, pin::Pin, time::Duration};

/// Default wall-clock budget for a single external command.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(4);

/// Future type returned by [`CommandRunner`] implementations.
pub type CommandFuture<'a> =
    Pin<Box<dyn Future<Output = Result<String, CommandError>> + Send + 'a>>;

/// Error type returned by [`CommandRunner`] operations.
///
/// Errors are `Clone` because coalesced callers sharing a dedupe key all
/// observe the outcome of the single underlying execution.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    /// The command string was empty or whitespace.
    #[error("empty command")]
    Empty,
    /// The shell process could not be spawned.
    #[error("failed to spawn shell: {context}")]
    Spawn {
        /// Human readable description of the spawn failure.
        context: String,
    },
    /// The command did not finish within its timeout.
    #[error("command timed out after {timeout:?}")]
    Timeout {
        /// Budget that was exceeded.
        timeout: Duration,
    },
    /// The command exited with a non-zero status.
    #[error("command failed: {message}")]
    Failed {
        /// First useful line of stderr, or a generic message.
        message: String,
    },
}

impl CommandError {
    /// Helper for constructing [`CommandError::Failed`].
    pub fn failed(message: impl Into<String>) -> Self {
        let message = message.into();
        let message = message.trim();

        Self::Failed {
            message: if message.is_empty() {
                "command failed".to_string()
            } else {
                message.to_string()
            },
        }
    }
}

/// A single external command invocation.
#[derive(Debug, Clone)]
pub struct CommandRequest {
    /// Shell command line, executed with `bash -lc`.
    pub command: String,
    /// Wall-clock budget; `Duration::ZERO` disables the timeout.
    pub timeout: Duration,
    /// When set, any failure resolves to an empty string instead of an error.
    pub allow_failure: bool,
    /// Logical key under which concurrent identical invocations coalesce.
    pub dedupe_key: Option<String>,
}

impl CommandRequest {
    /// Creates a request with the default timeout and no coalescing.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            timeout: DEFAULT_COMMAND_TIMEOUT,
            allow_failure: false,
            dedupe_key: None,
        }
    }

    /// Overrides the timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Marks failures as tolerated; they resolve to an empty string.
    #[must_use]
    pub fn allow_failure(mut self) -> Self {
        self.allow_failure = true;
        self
    }

    /// Sets the dedupe key. Blank keys are ignored.
    #[must_use]
    pub fn dedupe_key(mut self, key: impl Into<String>) -> Self {
        let key = key.into();
        let key = key.trim();
        self.dedupe_key = if key.is_empty() {
            None
        } else {
            Some(key.to_string())
        };
        self
    }
}

/// Port over external command execution.
///
/// Services depend on this trait instead of spawning processes directly so
/// parsers can be exercised against canned output in tests.
pub trait CommandRunner: Send + Sync {
    /// Executes the request, honouring timeout, failure tolerance and
    /// in-flight coalescing.
    fn run(&self, request: CommandRequest) -> CommandFuture<'_>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_dedupe_key_is_dropped() {
        let request = CommandRequest::new("true").dedupe_key("   ");
        assert_eq!(request.dedupe_key, None);

        let request = CommandRequest::new("true").dedupe_key(" refresh ");
        assert_eq!(request.dedupe_key.as_deref(), Some("refresh"));
    }

    #[test]
    fn failed_message_falls_back_when_blank() {
        assert_eq!(
            CommandError::failed("  "),
            CommandError::Failed {
                message: "command failed".into()
            }
        );
    }
}
