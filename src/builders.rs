//! Builder patterns for ergonomic workflow construction (v0.1)
//!
//! Fluent APIs for declaring workflows programmatically. This is the
//! surface an external workflow-file loader targets: it supplies, per
//! named scope, an ordered list of step procedures.

use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;

use crate::context::StepContext;
use crate::input::CogInput;
use crate::scope::{ProcResult, ScopeDef, Step, WorkflowDef};

// ============================================================================
// WORKFLOW BUILDER
// ============================================================================

/// Fluent builder for constructing workflows
#[derive(Default)]
pub struct WorkflowBuilder {
    top: Vec<Step>,
    scopes: Vec<ScopeDef>,
}

impl WorkflowBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare the top-level scope (runs first)
    pub fn top<F>(mut self, f: F) -> Self
    where
        F: FnOnce(ScopeBuilder) -> ScopeBuilder,
    {
        self.top = f(ScopeBuilder::new("main")).steps;
        self
    }

    /// Declare a named scope reachable via call/map/repeat
    pub fn scope<F>(mut self, name: &str, f: F) -> Self
    where
        F: FnOnce(ScopeBuilder) -> ScopeBuilder,
    {
        let builder = f(ScopeBuilder::new(name));
        self.scopes.push(ScopeDef::new(name, builder.steps));
        self
    }

    pub fn build(self) -> WorkflowDef {
        WorkflowDef::new(ScopeDef::new("main", self.top), self.scopes)
    }
}

// ============================================================================
// SCOPE BUILDER
// ============================================================================

/// Builder for one scope's ordered step list
pub struct ScopeBuilder {
    name: Arc<str>,
    steps: Vec<Step>,
}

impl ScopeBuilder {
    fn new(name: &str) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add a named cog step of any registered kind
    pub fn step<F, Fut>(mut self, kind: &str, name: &str, proc: F) -> Self
    where
        F: Fn(CogInput, StepContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ProcResult> + Send + 'static,
    {
        self.steps.push(Step::Cog {
            kind: kind.into(),
            name: Some(name.into()),
            proc: Arc::new(move |input, ctx| proc(input, ctx).boxed()),
        });
        self
    }

    /// Add an anonymous cog step
    pub fn anon<F, Fut>(mut self, kind: &str, proc: F) -> Self
    where
        F: Fn(CogInput, StepContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ProcResult> + Send + 'static,
    {
        self.steps.push(Step::Cog {
            kind: kind.into(),
            name: None,
            proc: Arc::new(move |input, ctx| proc(input, ctx).boxed()),
        });
        self
    }

    /// Pure-computation step (`fn` cog): the procedure's return value
    /// becomes the cog's output
    pub fn compute<F, Fut>(self, name: &str, proc: F) -> Self
    where
        F: Fn(CogInput, StepContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ProcResult> + Send + 'static,
    {
        self.step("fn", name, proc)
    }

    /// Shell-command step (`cmd` cog)
    pub fn cmd<F, Fut>(self, name: &str, proc: F) -> Self
    where
        F: Fn(CogInput, StepContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ProcResult> + Send + 'static,
    {
        self.step("cmd", name, proc)
    }

    /// Run the named scope once (`call` cog)
    pub fn call<F, Fut>(self, name: &str, run: &str, proc: F) -> Self
    where
        F: Fn(CogInput, StepContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ProcResult> + Send + 'static,
    {
        self.system_step("call", name, run, proc)
    }

    /// Run the named scope once per item (`map` cog)
    pub fn map<F, Fut>(self, name: &str, run: &str, proc: F) -> Self
    where
        F: Fn(CogInput, StepContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ProcResult> + Send + 'static,
    {
        self.system_step("map", name, run, proc)
    }

    /// Run the named scope in a loop (`repeat` cog)
    pub fn repeat<F, Fut>(self, name: &str, run: &str, proc: F) -> Self
    where
        F: Fn(CogInput, StepContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ProcResult> + Send + 'static,
    {
        self.system_step("repeat", name, run, proc)
    }

    fn system_step<F, Fut>(mut self, kind: &str, name: &str, run: &str, proc: F) -> Self
    where
        F: Fn(CogInput, StepContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ProcResult> + Send + 'static,
    {
        let run: Arc<str> = run.into();
        self.steps.push(Step::Cog {
            kind: kind.into(),
            name: Some(name.into()),
            proc: Arc::new(move |input, ctx| {
                input.set("run", run.as_ref());
                proc(input, ctx).boxed()
            }),
        });
        self
    }

    /// Lenient final-output override: access errors degrade to a nil
    /// final output
    pub fn outputs<F, Fut>(self, proc: F) -> Self
    where
        F: Fn(StepContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ProcResult> + Send + 'static,
    {
        self.outputs_step(false, proc)
    }

    /// Strict final-output override: evaluation errors propagate
    pub fn outputs_strict<F, Fut>(self, proc: F) -> Self
    where
        F: Fn(StepContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ProcResult> + Send + 'static,
    {
        self.outputs_step(true, proc)
    }

    fn outputs_step<F, Fut>(mut self, strict: bool, proc: F) -> Self
    where
        F: Fn(StepContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ProcResult> + Send + 'static,
    {
        self.steps.push(Step::Outputs {
            strict,
            proc: Arc::new(move |ctx| proc(ctx).boxed()),
        });
        self
    }
}
