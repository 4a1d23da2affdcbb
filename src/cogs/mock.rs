//! `mock` cog: deterministic test double (v0.1)
//!
//! Returns its `value` input, optionally after a real delay (for
//! exercising async scheduling) or as a forced failure.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::cog::{Cog, Invocation};
use crate::error::EngineError;
use crate::output::CogOutput;

pub struct MockCog;

#[async_trait]
impl Cog for MockCog {
    fn kind(&self) -> &'static str {
        "mock"
    }

    async fn execute(&self, invocation: Invocation) -> Result<CogOutput, EngineError> {
        if let Some(delay) = invocation
            .input
            .get("delay_ms")
            .and_then(|v| v.as_u64())
        {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        if let Some(reason) = invocation.input.get("fail").and_then(|v| match v {
            Value::String(s) => Some(s),
            _ => None,
        }) {
            return Err(EngineError::Execution(reason));
        }

        let value = invocation.input.get("value").unwrap_or(Value::Null);
        Ok(CogOutput::Value(Arc::new(value)))
    }
}
