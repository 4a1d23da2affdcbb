//! Workflow and scope definitions (v0.1)
//!
//! A workflow declares named scopes; each scope is an ordered list of
//! step descriptors. The crate does not parse workflow files; an
//! external loader (or the builder API) supplies these definitions.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::Value;

use crate::context::StepContext;
use crate::control::Halt;
use crate::input::CogInput;

/// What a step procedure returns: an optional value for input
/// coercion, or a halt (control signal / error).
pub type ProcResult = Result<Option<Value>, Halt>;

/// Deferred input-producing procedure of a cog step. Runs inside a
/// [`StepContext`]; may mutate the input, return a value, or both.
pub type InputProc = Arc<dyn Fn(CogInput, StepContext) -> BoxFuture<'static, ProcResult> + Send + Sync>;

/// Procedure of an `outputs` step; its return value becomes the
/// scope's final output.
pub type OutputProc = Arc<dyn Fn(StepContext) -> BoxFuture<'static, ProcResult> + Send + Sync>;

/// One step in a scope: either a cog-producing step (kind tag plus
/// input procedure) or an explicit final-output override.
#[derive(Clone)]
pub enum Step {
    Cog {
        kind: Arc<str>,
        name: Option<Arc<str>>,
        proc: InputProc,
    },
    Outputs {
        /// Strict (`outputs!`) propagates evaluation errors; lenient
        /// (`outputs`) degrades access errors to a nil final output.
        strict: bool,
        proc: OutputProc,
    },
}

impl Step {
    pub fn label(&self) -> String {
        match self {
            Step::Cog { kind, name, .. } => match name {
                Some(name) => format!("{kind}:{name}"),
                None => format!("{kind}:<anonymous>"),
            },
            Step::Outputs { strict: true, .. } => "outputs!".to_string(),
            Step::Outputs { strict: false, .. } => "outputs".to_string(),
        }
    }
}

impl fmt::Debug for Step {
    // procedures are opaque; print the label only
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Step({})", self.label())
    }
}

/// A named, ordered list of steps. Execution creates one isolated
/// namespace per invocation of a scope.
pub struct ScopeDef {
    name: Arc<str>,
    steps: Vec<Step>,
}

impl ScopeDef {
    pub fn new(name: impl Into<Arc<str>>, steps: Vec<Step>) -> Self {
        Self {
            name: name.into(),
            steps,
        }
    }

    pub fn name(&self) -> &Arc<str> {
        &self.name
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl fmt::Debug for ScopeDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeDef")
            .field("name", &self.name)
            .field("steps", &self.steps.len())
            .finish()
    }
}

/// The workflow: the top-level scope (run first) plus the named
/// scopes reachable via `call`/`map`/`repeat`.
#[derive(Debug)]
pub struct WorkflowDef {
    top: Arc<ScopeDef>,
    scopes: HashMap<Arc<str>, Arc<ScopeDef>>,
}

impl WorkflowDef {
    pub fn new(top: ScopeDef, named: Vec<ScopeDef>) -> Self {
        let scopes = named
            .into_iter()
            .map(|scope| (Arc::clone(scope.name()), Arc::new(scope)))
            .collect();
        Self {
            top: Arc::new(top),
            scopes,
        }
    }

    pub fn top(&self) -> Arc<ScopeDef> {
        Arc::clone(&self.top)
    }

    pub fn scope(&self, name: &str) -> Option<Arc<ScopeDef>> {
        self.scopes.get(name).map(Arc::clone)
    }

    pub fn scope_names(&self) -> Vec<Arc<str>> {
        let mut names: Vec<Arc<str>> = self.scopes.keys().cloned().collect();
        names.sort();
        names
    }
}
