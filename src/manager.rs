//! Execution manager: the scheduler core (v0.1)
//!
//! One manager per scope *invocation*: a `map` over 5 items creates 5
//! managers for the same scope definition. The manager pops steps in
//! declaration order, evaluates each step's input procedure in a
//! fresh [`StepContext`], registers the resulting cog, and runs it
//! inline (synchronous, the default) or as a background task (async
//! config). Scope exit joins every remaining background task before
//! the final output is computed; no orphaned tasks.
//!
//! Ordering: only data-dependency blocking (a `demand` on a running
//! cog) serializes otherwise-concurrent async work; a synchronous
//! step blocks every later step until it finishes.

use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tokio::task::JoinSet;
use tracing::{debug, instrument};

use crate::cog::{Cog, CogCell, ExecEnv, Invocation};
use crate::config::ConfigManager;
use crate::context::{ScopeHandle, StepContext};
use crate::control::{Halt, RunOutcome, Signal, StepOutcome};
use crate::error::EngineError;
use crate::event_log::{EventKind, EventLog};
use crate::input::CogInput;
use crate::output::CogOutput;
use crate::registry::CogRegistry;
use crate::scope::{InputProc, ScopeDef, Step, WorkflowDef};
use crate::store::CogStore;

/// Scheduler state machine. A manager is run at most once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ManagerState {
    Idle,
    Prepared,
    Running,
}

/// Scheduler for one scope invocation.
pub struct ExecutionManager {
    env: ExecEnv,
    scope: Arc<ScopeDef>,
    value: Option<Arc<Value>>,
    index: usize,
    state: ManagerState,
    store: CogStore,
    tasks: JoinSet<()>,
    /// Async-launched cells with their fail_on_error flag, checked at
    /// the scope-exit join.
    async_cells: Vec<(Arc<CogCell>, bool)>,
    /// Set once an outputs step ran; inner None means "nil override".
    outputs_override: Option<Option<CogOutput>>,
}

impl ExecutionManager {
    pub fn new(env: ExecEnv, scope: Arc<ScopeDef>) -> Self {
        Self {
            env,
            scope,
            value: None,
            index: 0,
            state: ManagerState::Idle,
            store: CogStore::new(),
            tasks: JoinSet::new(),
            async_cells: Vec::new(),
            outputs_override: None,
        }
    }

    /// Scope value handed down by call/map/repeat.
    pub fn with_value(mut self, value: Value) -> Self {
        self.value = Some(Arc::new(value));
        self
    }

    /// Position in a map/repeat sequence.
    pub fn with_index(mut self, index: usize) -> Self {
        self.index = index;
        self
    }

    /// Bind the step list and initialize the store and task set.
    /// Does not execute anything.
    pub fn prepare(&mut self) {
        if self.state == ManagerState::Idle {
            self.store = CogStore::new();
            self.async_cells.clear();
            self.state = ManagerState::Prepared;
        }
    }

    fn context(&self) -> StepContext {
        StepContext::new(self.store.clone(), self.value.clone(), self.index)
    }

    /// Run the scope to completion. Returns the finished invocation's
    /// handle plus how the run ended (completed, or cut short by a
    /// break/next signal for the caller to interpret).
    #[instrument(skip(self), fields(scope = %self.scope.name(), index = self.index))]
    pub async fn run(mut self) -> Result<(ScopeHandle, RunOutcome), EngineError> {
        if self.state != ManagerState::Prepared {
            return Err(EngineError::Execution(format!(
                "scope '{}' run without prepare (state {:?})",
                self.scope.name(),
                self.state
            )));
        }
        self.state = ManagerState::Running;

        let scope = Arc::clone(&self.scope);
        let scope_name = scope.name().to_string();
        let started = Instant::now();
        self.env.events.emit(EventKind::ScopeStarted {
            scope: scope_name.clone(),
            steps: scope.len(),
        });

        let mut outcome = RunOutcome::Completed;

        'steps: for (idx, step) in scope.steps().iter().enumerate() {
            debug!(step = %step.label(), "running step");
            let step_outcome = match step {
                Step::Outputs { strict, proc } => {
                    let evaluated = proc(self.context()).await;
                    self.eval_outputs_step(*strict, evaluated)
                }
                Step::Cog { kind, name, proc } => {
                    self.eval_cog_step(idx, kind, name.as_ref(), proc, &scope_name)
                        .await
                }
            };
            match step_outcome {
                Ok(StepOutcome::Ran(_) | StepOutcome::Skipped) => {}
                Ok(StepOutcome::Break) => {
                    self.emit_signal(&scope_name, Signal::Break);
                    outcome = RunOutcome::Signalled(Signal::Break);
                    break 'steps;
                }
                Ok(StepOutcome::Next) => {
                    self.emit_signal(&scope_name, Signal::Next);
                    outcome = RunOutcome::Signalled(Signal::Next);
                    break 'steps;
                }
                Err(err) => return Err(self.fail(err).await),
            }
        }

        // Scope exit: every launched background task joins before the
        // scope counts as done, referenced by later steps or not.
        if let Err(err) = self.join_all().await {
            return Err(self.fail(err).await);
        }
        for (cell, fail_on_error) in &self.async_cells {
            if let Some(reason) = cell.failure() {
                if *fail_on_error {
                    let err = EngineError::CogFailed {
                        name: cell.name().to_string(),
                        reason: reason.to_string(),
                    };
                    return Err(self.fail(err).await);
                }
            }
        }

        self.env.events.emit(EventKind::ScopeCompleted {
            scope: scope_name,
            duration_ms: started.elapsed().as_millis() as u64,
        });

        let final_output = self.final_output();
        let handle = ScopeHandle::new(
            Arc::clone(scope.name()),
            self.store,
            final_output,
            self.value,
            self.index,
        );
        Ok((handle, outcome))
    }

    /// Interpret an outputs step's evaluation. Lenient (`outputs`)
    /// degrades access errors into a nil override; strict
    /// (`outputs!`) propagates everything. Outputs steps register no
    /// cog, so a completed evaluation reports `Skipped`.
    fn eval_outputs_step(
        &mut self,
        strict: bool,
        evaluated: Result<Option<Value>, Halt>,
    ) -> Result<StepOutcome, EngineError> {
        match evaluated {
            Ok(value) => {
                self.outputs_override = Some(value.map(|v| CogOutput::Value(Arc::new(v))));
                Ok(StepOutcome::Skipped)
            }
            // skip inside an outputs step abandons the override and
            // leaves the default final output
            Err(Halt::Signal(Signal::Skip)) => Ok(StepOutcome::Skipped),
            Err(Halt::Signal(Signal::Break)) => Ok(StepOutcome::Break),
            Err(Halt::Signal(Signal::Next)) => Ok(StepOutcome::Next),
            Err(Halt::Error(err)) => {
                if strict || !err.is_access() {
                    return Err(err);
                }
                self.outputs_override = Some(None);
                Ok(StepOutcome::Skipped)
            }
        }
    }

    /// Evaluate one cog step: resolve kind and config, run the input
    /// procedure, coerce/validate, register the cell, then launch:
    /// inline for synchronous cogs, onto the task set for async ones.
    async fn eval_cog_step(
        &mut self,
        idx: usize,
        kind: &Arc<str>,
        name: Option<&Arc<str>>,
        proc: &InputProc,
        scope_name: &str,
    ) -> Result<StepOutcome, EngineError> {
        let cog = self
            .env
            .registry
            .get(kind)
            .ok_or_else(|| EngineError::UnknownCogKind {
                kind: kind.to_string(),
            })?;
        let name: Arc<str> = match name {
            Some(name) => Arc::clone(name),
            None => format!("{kind}#{idx}").into(),
        };
        let config = self.env.config.resolve(kind, &name);

        // Invocation protocol: empty input -> procedure (mutations +
        // captured return value) -> coerce -> validate.
        let input = CogInput::new();
        match proc(input.clone(), self.context()).await {
            Ok(returned) => input.coerce(returned, cog.primary_field()),
            Err(Halt::Signal(Signal::Skip)) => {
                let cell = Arc::new(CogCell::new(Arc::clone(&name), Arc::clone(kind)));
                cell.mark_skipped();
                self.store.insert(cell)?;
                self.env.events.emit(EventKind::CogSkipped {
                    scope: scope_name.to_string(),
                    cog: name.to_string(),
                });
                return Ok(StepOutcome::Skipped);
            }
            Err(Halt::Signal(Signal::Break)) => return Ok(StepOutcome::Break),
            Err(Halt::Signal(Signal::Next)) => return Ok(StepOutcome::Next),
            Err(Halt::Error(err)) => return Err(err),
        }

        cog.validate(&name, &input)?;

        let cell = Arc::new(CogCell::new(Arc::clone(&name), Arc::clone(kind)));
        self.store.insert(Arc::clone(&cell))?;

        let invocation = Invocation {
            name: Arc::clone(&name),
            input,
            config: config.clone(),
            env: self.env.clone(),
        };

        if config.is_async() {
            // background task: launch and move on without waiting
            self.async_cells
                .push((Arc::clone(&cell), config.fail_on_error()));
            self.tasks.spawn(run_cog(
                cog,
                invocation,
                Arc::clone(&cell),
                self.env.events.clone(),
                scope_name.to_string(),
            ));
        } else {
            run_cog(
                cog,
                invocation,
                Arc::clone(&cell),
                self.env.events.clone(),
                scope_name.to_string(),
            )
            .await;
            if let Some(reason) = cell.failure() {
                if config.fail_on_error() {
                    return Err(EngineError::CogFailed {
                        name: name.to_string(),
                        reason: reason.to_string(),
                    });
                }
            }
        }

        Ok(StepOutcome::Ran(cell))
    }

    fn emit_signal(&self, scope_name: &str, signal: Signal) {
        self.env.events.emit(EventKind::SignalRaised {
            scope: scope_name.to_string(),
            signal: signal.to_string(),
        });
    }

    /// The scope's final output: the explicit outputs override when
    /// one ran, else the last invoked cog's output (absent when that
    /// cog failed or nothing ran).
    fn final_output(&self) -> Option<CogOutput> {
        match &self.outputs_override {
            Some(overridden) => overridden.clone(),
            None => self.store.last_invoked().and_then(|cell| cell.output()),
        }
    }

    async fn join_all(&mut self) -> Result<(), EngineError> {
        let mut first_panic = None;
        while let Some(joined) = self.tasks.join_next().await {
            if let Err(err) = joined {
                if first_panic.is_none() {
                    first_panic = Some(EngineError::TaskPanic(err.to_string()));
                }
            }
        }
        match first_panic {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Abort path: join in-flight tasks (children never outlive the
    /// scope, even on failure), record the failure, hand the error
    /// back for propagation.
    async fn fail(mut self, err: EngineError) -> EngineError {
        while self.tasks.join_next().await.is_some() {}
        self.env.events.emit(EventKind::ScopeFailed {
            scope: self.scope.name().to_string(),
            error: err.to_string(),
        });
        err
    }
}

/// Run one cog through its lifecycle: running -> terminal, with event
/// emission. Used inline for synchronous cogs and spawned for async
/// ones; failures land in the cell, never unwind.
async fn run_cog(
    cog: Arc<dyn Cog>,
    invocation: Invocation,
    cell: Arc<CogCell>,
    events: EventLog,
    scope: String,
) {
    let started = Instant::now();
    cell.mark_running();
    events.emit(EventKind::CogStarted {
        scope: scope.clone(),
        cog: cell.name().to_string(),
        cog_kind: cell.kind().to_string(),
    });

    match cog.execute(invocation).await {
        Ok(output) => {
            cell.mark_succeeded(output);
            events.emit(EventKind::CogCompleted {
                scope,
                cog: cell.name().to_string(),
                duration_ms: started.elapsed().as_millis() as u64,
            });
        }
        Err(err) => {
            cell.mark_failed(err.to_string());
            events.emit(EventKind::CogFailed {
                scope,
                cog: cell.name().to_string(),
                error: err.to_string(),
                duration_ms: started.elapsed().as_millis() as u64,
            });
        }
    }
}

// ============================================================================
// ENGINE
// ============================================================================

/// Top-level entry point: owns the injected collaborators and runs
/// the workflow's top scope.
pub struct Engine {
    env: ExecEnv,
}

impl Engine {
    pub fn new(workflow: WorkflowDef) -> Self {
        Self {
            env: ExecEnv {
                workflow: Arc::new(workflow),
                registry: Arc::new(CogRegistry::with_builtins()),
                config: Arc::new(ConfigManager::new()),
                events: EventLog::new(),
            },
        }
    }

    pub fn with_registry(mut self, registry: CogRegistry) -> Self {
        self.env.registry = Arc::new(registry);
        self
    }

    pub fn with_config(mut self, config: ConfigManager) -> Self {
        self.env.config = Arc::new(config);
        self
    }

    /// The shared event log, for inspection after (or during) a run.
    pub fn events(&self) -> &EventLog {
        &self.env.events
    }

    /// Run the top-level scope.
    pub async fn run(&self) -> Result<ScopeHandle, EngineError> {
        self.run_scope(None).await
    }

    /// Run the top-level scope with an initial workflow value.
    pub async fn run_with_value(&self, value: Value) -> Result<ScopeHandle, EngineError> {
        self.run_scope(Some(value)).await
    }

    async fn run_scope(&self, value: Option<Value>) -> Result<ScopeHandle, EngineError> {
        let mut manager = ExecutionManager::new(self.env.clone(), self.env.workflow.top());
        if let Some(value) = value {
            manager = manager.with_value(value);
        }
        manager.prepare();
        let (handle, outcome) = manager.run().await?;
        match outcome {
            RunOutcome::Completed => Ok(handle),
            // break/next reaching the top scope is an authoring error
            RunOutcome::Signalled(signal) => Err(EngineError::StraySignal {
                signal: signal.to_string(),
            }),
        }
    }
}
