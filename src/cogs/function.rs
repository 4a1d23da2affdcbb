//! `fn` cog: pure computation (v0.1)
//!
//! The step procedure is where the computation happens; this cog
//! gives its result a name and a lifecycle. Output is whatever landed
//! in the input's `value` field.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::cog::{Cog, Invocation};
use crate::error::EngineError;
use crate::output::CogOutput;

pub struct FunctionCog;

#[async_trait]
impl Cog for FunctionCog {
    fn kind(&self) -> &'static str {
        "fn"
    }

    async fn execute(&self, invocation: Invocation) -> Result<CogOutput, EngineError> {
        let value = invocation.input.get("value").unwrap_or(Value::Null);
        Ok(CogOutput::Value(Arc::new(value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builders::WorkflowBuilder;
    use crate::manager::Engine;
    use serde_json::json;

    #[tokio::test]
    async fn output_is_the_value_field() {
        let workflow = WorkflowBuilder::new()
            .top(|s| {
                s.compute("double", |_input, _ctx| async {
                    let seed = 21;
                    Ok(Some(json!(seed * 2)))
                })
            })
            .build();

        let handle = Engine::new(workflow).run().await.unwrap();
        assert_eq!(handle.demand("double").unwrap().integer().unwrap(), 42);
    }

    #[tokio::test]
    async fn missing_value_yields_null() {
        let workflow = WorkflowBuilder::new()
            .top(|s| s.compute("nothing", |_input, _ctx| async { Ok(None) }))
            .build();

        let handle = Engine::new(workflow).run().await.unwrap();
        assert_eq!(
            handle.demand("nothing").unwrap().as_value().as_ref(),
            &Value::Null
        );
    }
}
