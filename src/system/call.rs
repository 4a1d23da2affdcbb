//! `call` system cog (v0.1)
//!
//! Runs a named scope exactly once. A break/next signal inside the
//! called scope simply ends that one invocation early; the outer
//! scope is unaffected and the invocation's final output degrades to
//! whatever was produced before the signal.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::cog::{Cog, Invocation};
use crate::error::EngineError;
use crate::input::CogInput;
use crate::manager::ExecutionManager;
use crate::output::{CallOutput, CogOutput};

#[derive(Debug, Deserialize)]
struct CallParams {
    run: String,
    #[serde(default)]
    value: Option<Value>,
    #[serde(default)]
    index: Option<usize>,
}

impl CallParams {
    fn parse(cog: &str, input: &CogInput) -> Result<Self, EngineError> {
        serde_json::from_value(input.to_value()).map_err(|e| EngineError::InvalidInput {
            cog: cog.to_string(),
            reason: e.to_string(),
        })
    }
}

pub struct CallCog;

#[async_trait]
impl Cog for CallCog {
    fn kind(&self) -> &'static str {
        "call"
    }

    fn primary_field(&self) -> &'static str {
        "value"
    }

    fn validate(&self, cog: &str, input: &CogInput) -> Result<(), EngineError> {
        CallParams::parse(cog, input).map(|_| ())
    }

    async fn execute(&self, invocation: Invocation) -> Result<CogOutput, EngineError> {
        let params = CallParams::parse(&invocation.name, &invocation.input)?;
        let scope = invocation
            .env
            .workflow
            .scope(&params.run)
            .ok_or_else(|| EngineError::UnknownScope {
                scope: params.run.clone(),
            })?;
        debug!(scope = %params.run, "calling scope");

        let mut manager = ExecutionManager::new(invocation.env.clone(), scope);
        if let Some(value) = params.value {
            manager = manager.with_value(value);
        }
        if let Some(index) = params.index {
            manager = manager.with_index(index);
        }
        manager.prepare();

        // the outcome is deliberately dropped: break/next only ends
        // this invocation early
        let (handle, _outcome) = manager.run().await?;
        Ok(CogOutput::Call(CallOutput::new(Arc::new(handle))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn validate_requires_run() {
        let cog = CallCog;
        let input = CogInput::new();
        assert!(matches!(
            cog.validate("c", &input),
            Err(EngineError::InvalidInput { .. })
        ));

        input.set("run", "body");
        assert!(cog.validate("c", &input).is_ok());
    }

    #[test]
    fn validate_accepts_value_and_index() {
        let cog = CallCog;
        let input = CogInput::new();
        input.set("run", "body");
        input.set("value", json!({"seed": 1}));
        input.set("index", 4);
        assert!(cog.validate("c", &input).is_ok());
    }
}
