//! `map` system cog (v0.1)
//!
//! Runs a named scope once per item. Serial by default; the
//! `parallel` config bounds (or unbounds) concurrent iterations via a
//! semaphore. Results are always assembled in original item order,
//! never completion order. A next signal empties that iteration's
//! slot and continues; a break signal empties the current slot and
//! stops dispatching the rest; already-running iterations are
//! allowed to finish.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::debug;

use crate::cog::{Cog, ExecEnv, Invocation};
use crate::config::Parallelism;
use crate::context::ScopeHandle;
use crate::control::{RunOutcome, Signal};
use crate::error::EngineError;
use crate::input::CogInput;
use crate::manager::ExecutionManager;
use crate::output::{CogOutput, MapOutput};
use crate::scope::ScopeDef;

#[derive(Debug, Deserialize)]
struct MapParams {
    run: String,
    items: Value,
    #[serde(default)]
    initial_index: usize,
}

impl MapParams {
    fn parse(cog: &str, input: &CogInput) -> Result<Self, EngineError> {
        let params: MapParams =
            serde_json::from_value(input.to_value()).map_err(|e| EngineError::InvalidInput {
                cog: cog.to_string(),
                reason: e.to_string(),
            })?;
        if params.items.is_null() {
            return Err(EngineError::InvalidInput {
                cog: cog.to_string(),
                reason: "items must be present".to_string(),
            });
        }
        Ok(params)
    }

    /// Arrays map per element; a single non-enumerable value is
    /// wrapped as one item.
    fn into_items(self) -> (String, Vec<Value>, usize) {
        let items = match self.items {
            Value::Array(items) => items,
            single => vec![single],
        };
        (self.run, items, self.initial_index)
    }
}

/// Result of one dispatched iteration, keyed by original index.
type IterationSlot = (usize, Result<(Option<Arc<ScopeHandle>>, bool), EngineError>);

pub struct MapCog;

#[async_trait]
impl Cog for MapCog {
    fn kind(&self) -> &'static str {
        "map"
    }

    fn primary_field(&self) -> &'static str {
        "items"
    }

    fn validate(&self, cog: &str, input: &CogInput) -> Result<(), EngineError> {
        MapParams::parse(cog, input).map(|_| ())
    }

    async fn execute(&self, invocation: Invocation) -> Result<CogOutput, EngineError> {
        let params = MapParams::parse(&invocation.name, &invocation.input)?;
        let (run, items, initial_index) = params.into_items();
        let scope = invocation
            .env
            .workflow
            .scope(&run)
            .ok_or_else(|| EngineError::UnknownScope { scope: run.clone() })?;

        let parallelism = invocation.config.parallelism();
        debug!(scope = %run, items = items.len(), ?parallelism, "mapping over scope");

        let output = match parallelism {
            Parallelism::Serial => {
                run_serial(&invocation.env, &scope, items, initial_index).await?
            }
            bounded_or_unbounded => {
                run_parallel(
                    &invocation.env,
                    &scope,
                    items,
                    initial_index,
                    bounded_or_unbounded,
                )
                .await?
            }
        };
        Ok(CogOutput::Map(output))
    }
}

async fn run_iteration(
    env: ExecEnv,
    scope: Arc<ScopeDef>,
    item: Value,
    index: usize,
) -> Result<(ScopeHandle, RunOutcome), EngineError> {
    let mut manager = ExecutionManager::new(env, scope)
        .with_value(item)
        .with_index(index);
    manager.prepare();
    manager.run().await
}

async fn run_serial(
    env: &ExecEnv,
    scope: &Arc<ScopeDef>,
    items: Vec<Value>,
    initial_index: usize,
) -> Result<MapOutput, EngineError> {
    let total = items.len();
    let mut slots: Vec<Option<Arc<ScopeHandle>>> = Vec::with_capacity(total);
    let mut broke = false;

    for (i, item) in items.into_iter().enumerate() {
        let (handle, outcome) =
            run_iteration(env.clone(), Arc::clone(scope), item, initial_index + i).await?;
        match outcome {
            RunOutcome::Completed => slots.push(Some(Arc::new(handle))),
            RunOutcome::Signalled(Signal::Next) => slots.push(None),
            RunOutcome::Signalled(Signal::Break) => {
                slots.push(None);
                broke = true;
                break;
            }
            // skip never escapes a scope run
            RunOutcome::Signalled(Signal::Skip) => {
                unreachable!("skip is caught at the step boundary")
            }
        }
    }

    slots.resize_with(total, || None);
    Ok(MapOutput::new(slots, broke))
}

async fn run_parallel(
    env: &ExecEnv,
    scope: &Arc<ScopeDef>,
    items: Vec<Value>,
    initial_index: usize,
    parallelism: Parallelism,
) -> Result<MapOutput, EngineError> {
    let total = items.len();
    let semaphore = match parallelism {
        Parallelism::Bounded(limit) => Some(Arc::new(Semaphore::new(limit))),
        _ => None,
    };
    // set on break (or error) to stop dispatching not-yet-started
    // iterations; in-flight ones are allowed to finish
    let stop = Arc::new(AtomicBool::new(false));

    let mut join_set: JoinSet<IterationSlot> = JoinSet::new();
    for (i, item) in items.into_iter().enumerate() {
        let env = env.clone();
        let scope = Arc::clone(scope);
        let semaphore = semaphore.clone();
        let stop = Arc::clone(&stop);

        join_set.spawn(async move {
            let _permit = match semaphore {
                Some(sem) => Some(
                    sem.acquire_owned()
                        .await
                        .expect("map semaphore is never closed"),
                ),
                None => None,
            };
            if stop.load(Ordering::Acquire) {
                return (i, Ok((None, false)));
            }

            match run_iteration(env, scope, item, initial_index + i).await {
                Ok((handle, RunOutcome::Completed)) => (i, Ok((Some(Arc::new(handle)), false))),
                Ok((_, RunOutcome::Signalled(Signal::Next))) => (i, Ok((None, false))),
                Ok((_, RunOutcome::Signalled(Signal::Break))) => {
                    stop.store(true, Ordering::Release);
                    (i, Ok((None, true)))
                }
                Ok((_, RunOutcome::Signalled(Signal::Skip))) => {
                    unreachable!("skip is caught at the step boundary")
                }
                Err(err) => {
                    stop.store(true, Ordering::Release);
                    (i, Err(err))
                }
            }
        });
    }

    let mut slots: Vec<Option<Arc<ScopeHandle>>> = vec![None; total];
    let mut broke = false;
    // failures propagate; report the earliest by item index for
    // deterministic behavior under concurrency
    let mut first_error: Option<(usize, EngineError)> = None;

    while let Some(joined) = join_set.join_next().await {
        match joined {
            Ok((i, Ok((slot, iteration_broke)))) => {
                slots[i] = slot;
                broke |= iteration_broke;
            }
            Ok((i, Err(err))) => {
                if first_error.as_ref().map_or(true, |(fi, _)| i < *fi) {
                    first_error = Some((i, err));
                }
            }
            Err(join_err) => {
                if first_error.is_none() {
                    first_error = Some((usize::MAX, EngineError::TaskPanic(join_err.to_string())));
                }
            }
        }
    }

    if let Some((_, err)) = first_error {
        return Err(err);
    }
    Ok(MapOutput::new(slots, broke))
}
