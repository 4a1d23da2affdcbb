//! Cog: one schedulable unit of work (v0.1)
//!
//! A [`CogCell`] tracks the lifecycle of one registered cog:
//! pending -> running -> succeeded/failed/skipped. Terminal state is set
//! exactly once and never mutated afterwards; waiters park on a watch
//! channel until the cell reaches a terminal state.
//!
//! The [`Cog`] trait is the seam to concrete implementations (shell
//! command, pure computation, nested scope runs). The scheduler is
//! agnostic to what a kind actually does.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::watch;

use crate::config::{CogConfig, ConfigManager};
use crate::error::EngineError;
use crate::event_log::EventLog;
use crate::input::CogInput;
use crate::output::CogOutput;
use crate::registry::CogRegistry;
use crate::scope::WorkflowDef;

/// Lifecycle state of a registered cog.
#[derive(Debug, Clone)]
pub enum CogState {
    Pending,
    Running,
    Succeeded(CogOutput),
    Failed(Arc<str>),
    Skipped,
}

impl CogState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CogState::Succeeded(_) | CogState::Failed(_) | CogState::Skipped
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            CogState::Pending => "pending",
            CogState::Running => "running",
            CogState::Succeeded(_) => "succeeded",
            CogState::Failed(_) => "failed",
            CogState::Skipped => "skipped",
        }
    }
}

/// One cog instance registered in a scope's store.
#[derive(Debug)]
pub struct CogCell {
    name: Arc<str>,
    kind: Arc<str>,
    state: RwLock<CogState>,
    done_tx: watch::Sender<bool>,
}

impl CogCell {
    pub fn new(name: impl Into<Arc<str>>, kind: impl Into<Arc<str>>) -> Self {
        let (done_tx, _) = watch::channel(false);
        Self {
            name: name.into(),
            kind: kind.into(),
            state: RwLock::new(CogState::Pending),
            done_tx,
        }
    }

    pub fn name(&self) -> &Arc<str> {
        &self.name
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn snapshot(&self) -> CogState {
        self.state.read().clone()
    }

    pub fn is_terminal(&self) -> bool {
        self.state.read().is_terminal()
    }

    pub fn succeeded(&self) -> bool {
        matches!(&*self.state.read(), CogState::Succeeded(_))
    }

    pub fn skipped(&self) -> bool {
        matches!(&*self.state.read(), CogState::Skipped)
    }

    /// The output, present iff the cog succeeded.
    pub fn output(&self) -> Option<CogOutput> {
        match &*self.state.read() {
            CogState::Succeeded(output) => Some(output.clone()),
            _ => None,
        }
    }

    /// The failure reason, present iff the cog failed.
    pub fn failure(&self) -> Option<Arc<str>> {
        match &*self.state.read() {
            CogState::Failed(reason) => Some(Arc::clone(reason)),
            _ => None,
        }
    }

    pub(crate) fn mark_running(&self) {
        let mut state = self.state.write();
        if !state.is_terminal() {
            *state = CogState::Running;
        }
    }

    pub(crate) fn mark_succeeded(&self, output: CogOutput) {
        self.transition(CogState::Succeeded(output));
    }

    pub(crate) fn mark_failed(&self, reason: impl Into<Arc<str>>) {
        self.transition(CogState::Failed(reason.into()));
    }

    pub(crate) fn mark_skipped(&self) {
        self.transition(CogState::Skipped);
    }

    fn transition(&self, next: CogState) {
        {
            let mut state = self.state.write();
            if state.is_terminal() {
                return;
            }
            *state = next;
        }
        self.done_tx.send_replace(true);
    }

    /// Suspend until the cog reaches a terminal state. Returns
    /// immediately when it already has.
    pub async fn wait_terminal(&self) -> CogState {
        let mut rx = self.done_tx.subscribe();
        // wait_for checks the current value first, so a cell that is
        // already terminal never parks
        let _ = rx.wait_for(|done| *done).await;
        self.snapshot()
    }
}

/// Shared collaborators a cog execution may need: the workflow (for
/// system cogs that run nested scopes), the registry, the config
/// manager, and the event log. Injected explicitly; there are no
/// process-wide singletons.
#[derive(Clone)]
pub struct ExecEnv {
    pub workflow: Arc<WorkflowDef>,
    pub registry: Arc<CogRegistry>,
    pub config: Arc<ConfigManager>,
    pub events: EventLog,
}

/// Everything a single cog execution receives: its name, the
/// validated input, the resolved (immutable) config, and the shared
/// environment.
pub struct Invocation {
    pub name: Arc<str>,
    pub input: CogInput,
    pub config: CogConfig,
    pub env: ExecEnv,
}

/// A cog implementation. `execute` receives a validated input and
/// either returns an output or fails; the scheduler owns the
/// lifecycle bookkeeping around it.
#[async_trait]
pub trait Cog: Send + Sync {
    /// Kind tag this implementation registers under (e.g. "cmd").
    fn kind(&self) -> &'static str;

    /// Input field a scalar return value from the step procedure
    /// coerces into.
    fn primary_field(&self) -> &'static str {
        "value"
    }

    /// Check the populated input. A failure here is a
    /// workflow-authoring error and is never retried.
    fn validate(&self, _cog: &str, _input: &CogInput) -> Result<(), EngineError> {
        Ok(())
    }

    async fn execute(&self, invocation: Invocation) -> Result<CogOutput, EngineError>;
}
