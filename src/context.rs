//! Step evaluation contexts (v0.1)
//!
//! [`StepContext`] is the namespace a step procedure runs in: the
//! current scope's cogs plus the scope value/index handed down by
//! `call`/`map`/`repeat`. [`ScopeHandle`] is the read-only view of a
//! *finished* invocation, reachable only through invocation handles;
//! the cross-scope isolation boundary.

use std::sync::Arc;

use serde_json::Value;

use crate::cog::CogState;
use crate::error::EngineError;
use crate::output::CogOutput;
use crate::store::CogStore;

/// The evaluation environment of a step procedure, bound to one live
/// execution manager. Cheap to clone.
#[derive(Debug, Clone)]
pub struct StepContext {
    store: CogStore,
    value: Option<Arc<Value>>,
    index: usize,
}

impl StepContext {
    pub(crate) fn new(store: CogStore, value: Option<Arc<Value>>, index: usize) -> Self {
        Self {
            store,
            value,
            index,
        }
    }

    /// The scope value passed in by `call`/`map`/`repeat`, if any.
    pub fn value(&self) -> Option<&Value> {
        self.value.as_deref()
    }

    /// Position in a map/repeat sequence (0 outside one).
    pub fn index(&self) -> usize {
        self.index
    }

    /// Non-raising accessor: the named cog's output if it has
    /// completed successfully, `None` if it has not (yet) or does not
    /// exist in this scope.
    pub fn output(&self, name: &str) -> Option<CogOutput> {
        self.store.get(name).and_then(|cell| cell.output())
    }

    /// Strict accessor: raises if no cog with that name was ever
    /// defined in this scope; waits for a started-but-running cog;
    /// raises if the cog failed or was skipped.
    pub async fn demand(&self, name: &str) -> Result<CogOutput, EngineError> {
        let cell = self
            .store
            .get(name)
            .ok_or_else(|| EngineError::CogDoesNotExist {
                name: name.to_string(),
            })?;
        match cell.wait_terminal().await {
            CogState::Succeeded(output) => Ok(output),
            CogState::Failed(reason) => Err(EngineError::CogFailed {
                name: name.to_string(),
                reason: reason.to_string(),
            }),
            CogState::Skipped => Err(EngineError::CogSkipped {
                name: name.to_string(),
            }),
            // wait_terminal only returns terminal states
            state => Err(EngineError::Execution(format!(
                "cog '{name}' in non-terminal state {}",
                state.label()
            ))),
        }
    }

    /// Boolean accessor: true iff the cog exists and succeeded.
    pub fn succeeded(&self, name: &str) -> bool {
        self.store
            .get(name)
            .is_some_and(|cell| cell.succeeded())
    }
}

/// Read-only view of one finished scope invocation: its namespace,
/// final output and the value/index it ran with. All cogs are
/// terminal, so access never blocks.
#[derive(Debug)]
pub struct ScopeHandle {
    scope: Arc<str>,
    store: CogStore,
    final_output: Option<CogOutput>,
    value: Option<Arc<Value>>,
    index: usize,
}

impl ScopeHandle {
    pub(crate) fn new(
        scope: Arc<str>,
        store: CogStore,
        final_output: Option<CogOutput>,
        value: Option<Arc<Value>>,
        index: usize,
    ) -> Self {
        Self {
            scope,
            store,
            final_output,
            value,
            index,
        }
    }

    pub fn scope_name(&self) -> &str {
        &self.scope
    }

    pub fn value(&self) -> Option<&Value> {
        self.value.as_deref()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// The invocation's final output: its last invoked cog's output,
    /// or the explicit outputs override.
    pub fn final_output(&self) -> Option<CogOutput> {
        self.final_output.clone()
    }

    /// Scalar form of the final output (`null` when absent).
    pub fn final_value(&self) -> Arc<Value> {
        self.final_output
            .as_ref()
            .map(|output| output.as_value())
            .unwrap_or_else(|| Arc::new(Value::Null))
    }

    /// Same contract as [`StepContext::output`], against this
    /// invocation's namespace.
    pub fn output(&self, name: &str) -> Option<CogOutput> {
        self.store.get(name).and_then(|cell| cell.output())
    }

    /// Same contract as [`StepContext::demand`]; synchronous because
    /// every cog in a finished invocation is terminal.
    pub fn demand(&self, name: &str) -> Result<CogOutput, EngineError> {
        let cell = self
            .store
            .get(name)
            .ok_or_else(|| EngineError::CogDoesNotExist {
                name: name.to_string(),
            })?;
        match cell.snapshot() {
            CogState::Succeeded(output) => Ok(output),
            CogState::Failed(reason) => Err(EngineError::CogFailed {
                name: name.to_string(),
                reason: reason.to_string(),
            }),
            CogState::Skipped => Err(EngineError::CogSkipped {
                name: name.to_string(),
            }),
            state => Err(EngineError::Execution(format!(
                "cog '{name}' in non-terminal state {}",
                state.label()
            ))),
        }
    }

    pub fn succeeded(&self, name: &str) -> bool {
        self.store
            .get(name)
            .is_some_and(|cell| cell.succeeded())
    }

    /// Evaluate a projection against this invocation's namespace (the
    /// block form of cross-scope access).
    pub fn read<T>(&self, f: impl FnOnce(&ScopeHandle) -> T) -> T {
        f(self)
    }
}
