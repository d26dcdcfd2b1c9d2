//! Recording fake for tests: every invocation is logged, and outcomes are
//! scripted by command-line prefix. Unscripted commands succeed silently.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::RunnerError;
use crate::runner::{CommandOutput, CommandRunner, CommandSpec};

#[derive(Debug, Clone)]
enum Outcome {
    Output(CommandOutput),
    Timeout,
}

#[derive(Debug, Default)]
pub struct ScriptedRunner {
    rules: Mutex<Vec<(String, Outcome)>>,
    calls: Mutex<Vec<CommandSpec>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commands whose display form starts with `prefix` return `output`.
    /// Earlier rules win.
    pub fn on(self, prefix: impl Into<String>, output: CommandOutput) -> Self {
        self.push(prefix.into(), Outcome::Output(output));
        self
    }

    /// Commands starting with `prefix` exit with `code` and `stderr`.
    pub fn fail_on(self, prefix: impl Into<String>, code: i32, stderr: impl Into<String>) -> Self {
        self.on(prefix, CommandOutput::failed(code, stderr))
    }

    /// Commands starting with `prefix` hit their deadline.
    pub fn timeout_on(self, prefix: impl Into<String>) -> Self {
        self.push(prefix.into(), Outcome::Timeout);
        self
    }

    fn push(&self, prefix: String, outcome: Outcome) {
        self.rules
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push((prefix, outcome));
    }

    /// Every command run so far, in display form.
    pub fn calls(&self) -> Vec<String> {
        self.specs().iter().map(ToString::to_string).collect()
    }

    /// Every command run so far, with cwd and timeout.
    pub fn specs(&self) -> Vec<CommandSpec> {
        self.calls.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    /// Number of recorded commands starting with `prefix`.
    pub fn count(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, RunnerError> {
        self.calls
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(spec.clone());

        let line = spec.to_string();
        let outcome = self
            .rules
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .iter()
            .find(|(prefix, _)| line.starts_with(prefix.as_str()))
            .map(|(_, outcome)| outcome.clone());

        match outcome {
            Some(Outcome::Output(output)) => Ok(output),
            Some(Outcome::Timeout) => Err(RunnerError::Timeout {
                command: line,
                timeout: spec.timeout,
            }),
            None => Ok(CommandOutput::ok("")),
        }
    }
}
