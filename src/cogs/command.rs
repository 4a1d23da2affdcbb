//! `cmd` cog: shell command execution (v0.1)
//!
//! Thin adapter over the [`CommandRunner`]: required `command` input,
//! optional `stdin`/`working_dir`, timeout and working directory
//! defaults from the resolved config. A non-zero exit is an execution
//! failure; whether that aborts the scope is the scheduler's
//! `fail_on_error` concern.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::cog::{Cog, Invocation};
use crate::command_runner::{CommandRequest, CommandRunner, DEFAULT_COMMAND_TIMEOUT};
use crate::error::EngineError;
use crate::input::CogInput;
use crate::output::CogOutput;

#[derive(Debug, Deserialize)]
struct CmdParams {
    command: String,
    #[serde(default)]
    stdin: Option<String>,
    #[serde(default)]
    working_dir: Option<String>,
}

impl CmdParams {
    fn parse(cog: &str, input: &CogInput) -> Result<Self, EngineError> {
        serde_json::from_value(input.to_value()).map_err(|e| EngineError::InvalidInput {
            cog: cog.to_string(),
            reason: e.to_string(),
        })
    }
}

pub struct CommandCog {
    runner: CommandRunner,
}

impl CommandCog {
    pub fn new() -> Self {
        Self {
            runner: CommandRunner::new(),
        }
    }
}

impl Default for CommandCog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Cog for CommandCog {
    fn kind(&self) -> &'static str {
        "cmd"
    }

    fn primary_field(&self) -> &'static str {
        "command"
    }

    fn validate(&self, cog: &str, input: &CogInput) -> Result<(), EngineError> {
        CmdParams::parse(cog, input).map(|_| ())
    }

    async fn execute(&self, invocation: Invocation) -> Result<CogOutput, EngineError> {
        let params = CmdParams::parse(&invocation.name, &invocation.input)?;

        let mut request = CommandRequest::new(&params.command)
            .timeout(invocation.config.timeout().unwrap_or(DEFAULT_COMMAND_TIMEOUT));
        // input overrides config for the working directory
        if let Some(dir) = params
            .working_dir
            .as_deref()
            .or_else(|| invocation.config.working_dir())
        {
            request = request.working_dir(dir);
        }
        if let Some(stdin) = params.stdin {
            request = request.stdin(stdin);
        }

        let outcome = self.runner.execute(request).await?;
        if !outcome.success() {
            return Err(EngineError::Execution(format!(
                "Command failed with status {}: {}",
                outcome.status,
                outcome.stderr.trim()
            )));
        }

        Ok(CogOutput::Value(Arc::new(Value::String(
            outcome.stdout.trim().to_string(),
        ))))
    }
}
