//! Cog outputs (v0.1)
//!
//! Immutable after construction. A plain cog produces a JSON value;
//! the system cogs produce invocation handles (`call`, `map`,
//! `repeat`) whose only public use is the cross-scope accessor
//! protocol: they never expose another scope's store for mutation.
//!
//! The text/JSON/number capabilities live here as typed accessors
//! instead of an open-ended dynamic dispatch chain.

use std::sync::Arc;

use serde_json::Value;

use crate::context::ScopeHandle;
use crate::error::EngineError;
use crate::extract;

/// Output of one cog execution.
#[derive(Debug, Clone)]
pub enum CogOutput {
    /// A plain JSON value.
    Value(Arc<Value>),
    /// Handle to one finished scope invocation (`call`).
    Call(CallOutput),
    /// Handles to the iterations of a `map` run.
    Map(MapOutput),
    /// Result of a `repeat` loop.
    Repeat(RepeatOutput),
}

impl CogOutput {
    pub fn value(value: impl Into<Value>) -> Self {
        CogOutput::Value(Arc::new(value.into()))
    }

    /// Scalar view of the output. Handles flatten to the value their
    /// invocation produced: a call to its scope's final output, a map
    /// to the array of per-iteration outputs (`null` for iterations
    /// that never ran), a repeat to its carried value.
    pub fn as_value(&self) -> Arc<Value> {
        match self {
            CogOutput::Value(v) => Arc::clone(v),
            CogOutput::Call(call) => call.scope().final_value(),
            CogOutput::Map(map) => {
                let items: Vec<Value> = map
                    .outputs()
                    .into_iter()
                    .map(|slot| match slot {
                        Some(output) => output.as_value().as_ref().clone(),
                        None => Value::Null,
                    })
                    .collect();
                Arc::new(Value::Array(items))
            }
            CogOutput::Repeat(repeat) => repeat
                .value()
                .map(|output| output.as_value())
                .unwrap_or_else(|| Arc::new(Value::Null)),
        }
    }

    pub fn as_call(&self) -> Option<&CallOutput> {
        match self {
            CogOutput::Call(call) => Some(call),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&MapOutput> {
        match self {
            CogOutput::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_repeat(&self) -> Option<&RepeatOutput> {
        match self {
            CogOutput::Repeat(repeat) => Some(repeat),
            _ => None,
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Text capability
    // ─────────────────────────────────────────────────────────────

    /// String form: string values verbatim, anything else as compact
    /// JSON.
    pub fn text(&self) -> String {
        match self.as_value().as_ref() {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }

    pub fn trimmed(&self) -> String {
        self.text().trim().to_string()
    }

    pub fn lines(&self) -> Vec<String> {
        self.text().lines().map(str::to_string).collect()
    }

    // ─────────────────────────────────────────────────────────────
    // JSON capability
    // ─────────────────────────────────────────────────────────────

    /// Structured view. Already-structured values pass through;
    /// strings go through the extraction cascade (whole string ->
    /// fenced blocks -> delimited substrings).
    pub fn json(&self) -> Result<Value, EngineError> {
        let value = self.as_value();
        match value.as_ref() {
            Value::String(s) => extract::json(s),
            other => Ok(other.clone()),
        }
    }

    /// Non-raising variant of [`json`](CogOutput::json).
    pub fn try_json(&self) -> Option<Value> {
        self.json().ok()
    }

    // ─────────────────────────────────────────────────────────────
    // Numeric capability
    // ─────────────────────────────────────────────────────────────

    pub fn number(&self) -> Result<f64, EngineError> {
        match self.as_value().as_ref() {
            Value::Number(n) => n
                .as_f64()
                .ok_or(EngineError::NoNumber),
            other => extract::number(&value_text(other)),
        }
    }

    pub fn try_number(&self) -> Option<f64> {
        self.number().ok()
    }

    pub fn integer(&self) -> Result<i64, EngineError> {
        self.number().map(|n| n.round() as i64)
    }

    pub fn try_integer(&self) -> Option<i64> {
        self.integer().ok()
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ════════════════════════════════════════════════════════════════
// CALL OUTPUT
// ════════════════════════════════════════════════════════════════

/// Handle to a single finished scope invocation.
#[derive(Debug, Clone)]
pub struct CallOutput {
    scope: Arc<ScopeHandle>,
}

impl CallOutput {
    pub(crate) fn new(scope: Arc<ScopeHandle>) -> Self {
        Self { scope }
    }

    /// The invocation's namespace, read-only. This is the `from`
    /// target: accessors evaluate against the invocation's own cogs,
    /// never the outer scope's.
    pub fn scope(&self) -> &ScopeHandle {
        &self.scope
    }

    /// The invocation's final output (the no-block `from` form).
    pub fn final_output(&self) -> Option<CogOutput> {
        self.scope.final_output()
    }
}

// ════════════════════════════════════════════════════════════════
// MAP OUTPUT
// ════════════════════════════════════════════════════════════════

#[derive(Debug)]
struct MapInner {
    /// One slot per item, in original item order. `None` for
    /// iterations ended by next/break or never started.
    slots: Vec<Option<Arc<ScopeHandle>>>,
    broke: bool,
}

/// Ordered handles to the iterations of a `map` run.
#[derive(Debug, Clone)]
pub struct MapOutput {
    inner: Arc<MapInner>,
}

impl MapOutput {
    pub(crate) fn new(slots: Vec<Option<Arc<ScopeHandle>>>, broke: bool) -> Self {
        Self {
            inner: Arc::new(MapInner { slots, broke }),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.slots.is_empty()
    }

    /// True when a break signal ended the run early.
    pub fn broke(&self) -> bool {
        self.inner.broke
    }

    /// Bounds-checked iteration access; negative indices count from
    /// the end. Raises when the slot is empty because the iteration
    /// never ran.
    pub fn iteration(&self, index: i64) -> Result<Arc<ScopeHandle>, EngineError> {
        let len = self.len();
        let missing = || EngineError::IterationMissing { index, len };
        let resolved = if index < 0 {
            len.checked_sub(index.unsigned_abs() as usize)
        } else {
            Some(index as usize)
        };
        let idx = resolved.filter(|i| *i < len).ok_or_else(missing)?;
        self.inner.slots[idx].clone().ok_or_else(missing)
    }

    pub fn first(&self) -> Result<Arc<ScopeHandle>, EngineError> {
        self.iteration(0)
    }

    pub fn last(&self) -> Result<Arc<ScopeHandle>, EngineError> {
        self.iteration(-1)
    }

    /// Map a projection over every iteration in original item order,
    /// regardless of completion order. Iterations that never ran
    /// appear as `None`.
    pub fn collect<T>(&self, mut f: impl FnMut(&ScopeHandle) -> T) -> Vec<Option<T>> {
        self.inner
            .slots
            .iter()
            .map(|slot| slot.as_deref().map(&mut f))
            .collect()
    }

    /// Identity projection: each iteration's final output.
    pub fn outputs(&self) -> Vec<Option<CogOutput>> {
        self.inner
            .slots
            .iter()
            .map(|slot| slot.as_deref().and_then(ScopeHandle::final_output))
            .collect()
    }

    /// Fold over iterations in original order. Skipped iterations are
    /// folded as `None`; a `None` returned by the block never
    /// overwrites a non-`None` accumulator, so short-circuited
    /// iterations cannot erase progress.
    pub fn reduce(
        &self,
        initial: Option<Value>,
        mut f: impl FnMut(Option<Value>, Option<&ScopeHandle>) -> Option<Value>,
    ) -> Option<Value> {
        let mut acc = initial;
        for slot in &self.inner.slots {
            let next = f(acc.clone(), slot.as_deref());
            acc = next.or(acc);
        }
        acc
    }
}

// ════════════════════════════════════════════════════════════════
// REPEAT OUTPUT
// ════════════════════════════════════════════════════════════════

#[derive(Debug)]
struct RepeatInner {
    value: Option<CogOutput>,
    iterations: usize,
    broke: bool,
    results: MapOutput,
}

/// Result of a `repeat` loop.
#[derive(Debug, Clone)]
pub struct RepeatOutput {
    inner: Arc<RepeatInner>,
}

impl RepeatOutput {
    pub(crate) fn new(
        value: Option<CogOutput>,
        iterations: usize,
        broke: bool,
        results: MapOutput,
    ) -> Self {
        Self {
            inner: Arc::new(RepeatInner {
                value,
                iterations,
                broke,
                results,
            }),
        }
    }

    /// The carried value: the last iteration's final output, or
    /// `None` if no iteration produced one.
    pub fn value(&self) -> Option<CogOutput> {
        self.inner.value.clone()
    }

    /// How many iterations actually ran.
    pub fn iterations(&self) -> usize {
        self.inner.iterations
    }

    /// True iff a break occurred before the max_iterations bound.
    pub fn broke(&self) -> bool {
        self.inner.broke
    }

    /// Map-shaped view over the iterations, for collect/reduce.
    pub fn results(&self) -> &MapOutput {
        &self.inner.results
    }

    pub fn iteration(&self, index: i64) -> Result<Arc<ScopeHandle>, EngineError> {
        self.inner.results.iteration(index)
    }

    pub fn first(&self) -> Result<Arc<ScopeHandle>, EngineError> {
        self.inner.results.first()
    }

    pub fn last(&self) -> Result<Arc<ScopeHandle>, EngineError> {
        self.inner.results.last()
    }
}
