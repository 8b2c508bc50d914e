//! Test doubles shared by service tests.

use std::sync::Mutex;

use futures::FutureExt;
use shellstate_proto::ports::{CommandError, CommandFuture, CommandRequest, CommandRunner};

/// A [`CommandRunner`] that serves canned output keyed by command substring.
///
/// Commands with no matching stub fail (or resolve empty under
/// `allow_failure`), which mirrors a missing binary and exercises the
/// degradation paths.
#[derive(Default)]
pub struct FakeRunner {
    stubs: Mutex<Vec<(String, Result<String, CommandError>)>>,
    calls: Mutex<Vec<String>>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers canned stdout for any command containing `needle`.
    pub fn respond(&self, needle: impl Into<String>, output: impl Into<String>) {
        self.stubs
            .lock()
            .expect("stub lock")
            .push((needle.into(), Ok(output.into())));
    }

    /// Registers a failure for any command containing `needle`.
    pub fn fail(&self, needle: impl Into<String>, error: CommandError) {
        self.stubs
            .lock()
            .expect("stub lock")
            .push((needle.into(), Err(error)));
    }

    /// Every command line this runner has been asked to execute.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("call lock").clone()
    }

    /// Number of executed commands containing `needle`.
    pub fn call_count(&self, needle: &str) -> usize {
        self.calls()
            .iter()
            .filter(|call| call.contains(needle))
            .count()
    }
}

impl CommandRunner for FakeRunner {
    fn run(&self, request: CommandRequest) -> CommandFuture<'_> {
        self.calls
            .lock()
            .expect("call lock")
            .push(request.command.clone());

        let result = {
            let stubs = self.stubs.lock().expect("stub lock");
            stubs
                .iter()
                .find(|(needle, _)| request.command.contains(needle.as_str()))
                .map(|(_, result)| result.clone())
        };

        let result = match result {
            Some(result) => result,
            None => Err(CommandError::failed(format!(
                "no stub for command: {}",
                request.command
            ))),
        };

        let result = match result {
            Err(_) if request.allow_failure => Ok(String::new()),
            other => other,
        };

        async move { result }.boxed()
    }
}
