//! `repeat` system cog (v0.1)
//!
//! Runs a named scope in a loop, threading each iteration's final
//! output into the next iteration's scope value, until a break signal
//! or the required `max_iterations` bound.
//!
//! Signal conventions (see DESIGN.md):
//! - break: the loop ends; the breaking iteration's partial final
//!   output (whatever its scope produced before the signal) becomes
//!   the carried `value`, but its results slot stays empty.
//! - next: only that iteration's slot is emptied; the loop continues
//!   with the previous successfully-produced value carried forward.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::cog::{Cog, Invocation};
use crate::context::ScopeHandle;
use crate::control::{RunOutcome, Signal};
use crate::error::EngineError;
use crate::input::CogInput;
use crate::manager::ExecutionManager;
use crate::output::{CogOutput, MapOutput, RepeatOutput};

#[derive(Debug, Deserialize)]
struct RepeatParams {
    run: String,
    #[serde(default)]
    value: Option<Value>,
    #[serde(default)]
    max_iterations: Option<i64>,
}

impl RepeatParams {
    fn parse(cog: &str, input: &CogInput) -> Result<Self, EngineError> {
        serde_json::from_value(input.to_value()).map_err(|e| EngineError::InvalidInput {
            cog: cog.to_string(),
            reason: e.to_string(),
        })
    }

    /// The bound is required and must be positive; a runaway loop is
    /// a configuration error, not something to ignore silently.
    fn bound(&self, cog: &str) -> Result<u64, EngineError> {
        match self.max_iterations {
            Some(n) if n > 0 => Ok(n as u64),
            _ => Err(EngineError::MissingMaxIterations {
                cog: cog.to_string(),
            }),
        }
    }
}

pub struct RepeatCog;

#[async_trait]
impl Cog for RepeatCog {
    fn kind(&self) -> &'static str {
        "repeat"
    }

    fn primary_field(&self) -> &'static str {
        "value"
    }

    fn validate(&self, cog: &str, input: &CogInput) -> Result<(), EngineError> {
        let params = RepeatParams::parse(cog, input)?;
        params.bound(cog).map(|_| ())
    }

    async fn execute(&self, invocation: Invocation) -> Result<CogOutput, EngineError> {
        let params = RepeatParams::parse(&invocation.name, &invocation.input)?;
        let max_iterations = params.bound(&invocation.name)?;
        let scope = invocation
            .env
            .workflow
            .scope(&params.run)
            .ok_or_else(|| EngineError::UnknownScope {
                scope: params.run.clone(),
            })?;
        debug!(scope = %params.run, max_iterations, "repeating scope");

        let mut carry: Option<CogOutput> = params.value.map(CogOutput::value);
        let mut slots: Vec<Option<Arc<ScopeHandle>>> = Vec::new();
        let mut iterations = 0usize;
        let mut broke = false;

        for i in 0..max_iterations {
            let mut manager = ExecutionManager::new(invocation.env.clone(), Arc::clone(&scope))
                .with_index(i as usize);
            if let Some(value) = &carry {
                manager = manager.with_value(value.as_value().as_ref().clone());
            }
            manager.prepare();

            let (handle, outcome) = manager.run().await?;
            iterations += 1;

            match outcome {
                RunOutcome::Completed => {
                    carry = handle.final_output();
                    slots.push(Some(Arc::new(handle)));
                }
                RunOutcome::Signalled(Signal::Next) => {
                    // previous successfully-produced value carries on
                    slots.push(None);
                }
                RunOutcome::Signalled(Signal::Break) => {
                    if let Some(partial) = handle.final_output() {
                        carry = Some(partial);
                    }
                    slots.push(None);
                    broke = true;
                    break;
                }
                RunOutcome::Signalled(Signal::Skip) => {
                    unreachable!("skip is caught at the step boundary")
                }
            }
        }

        let results = MapOutput::new(slots, broke);
        Ok(CogOutput::Repeat(RepeatOutput::new(
            carry, iterations, broke, results,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn validate_requires_positive_bound() {
        let cog = RepeatCog;
        let input = CogInput::new();
        input.set("run", "body");

        // absent
        assert!(matches!(
            cog.validate("r", &input),
            Err(EngineError::MissingMaxIterations { .. })
        ));

        // zero
        input.set("max_iterations", 0);
        assert!(matches!(
            cog.validate("r", &input),
            Err(EngineError::MissingMaxIterations { .. })
        ));

        let negative = CogInput::new();
        negative.set("run", "body");
        negative.set("max_iterations", -3);
        assert!(matches!(
            cog.validate("r", &negative),
            Err(EngineError::MissingMaxIterations { .. })
        ));

        let valid = CogInput::new();
        valid.set("run", "body");
        valid.set("max_iterations", 10);
        assert!(cog.validate("r", &valid).is_ok());
    }

    #[test]
    fn validate_requires_run() {
        let cog = RepeatCog;
        let input = CogInput::new();
        input.set("max_iterations", 5);
        assert!(matches!(
            cog.validate("r", &input),
            Err(EngineError::InvalidInput { .. })
        ));
    }

    #[test]
    fn seed_value_is_optional() {
        let cog = RepeatCog;
        let input = CogInput::new();
        input.set("run", "body");
        input.set("max_iterations", 2);
        input.set("value", json!(0));
        assert!(cog.validate("r", &input).is_ok());
    }
}
