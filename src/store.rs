//! Per-scope cog storage (v0.1)
//!
//! Insertion-ordered name -> cell map, scoped to one execution manager
//! invocation. Names are unique per scope invocation, not globally;
//! inserting a duplicate raises. Clones share the same underlying
//! storage so step contexts and the manager observe one store.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::cog::CogCell;
use crate::error::EngineError;

#[derive(Debug, Default)]
struct StoreInner {
    order: Vec<Arc<CogCell>>,
    by_name: HashMap<Arc<str>, usize>,
}

/// Thread-safe cog store for one scope invocation.
#[derive(Debug, Clone, Default)]
pub struct CogStore {
    inner: Arc<RwLock<StoreInner>>,
}

impl CogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a cell under its name. Raises `DuplicateCog` when the
    /// name is already taken in this scope invocation.
    pub fn insert(&self, cell: Arc<CogCell>) -> Result<(), EngineError> {
        let mut inner = self.inner.write();
        let name = Arc::clone(cell.name());
        if inner.by_name.contains_key(&name) {
            return Err(EngineError::DuplicateCog {
                name: name.to_string(),
            });
        }
        let idx = inner.order.len();
        inner.order.push(cell);
        inner.by_name.insert(name, idx);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<CogCell>> {
        let inner = self.inner.read();
        inner
            .by_name
            .get(name)
            .map(|&idx| Arc::clone(&inner.order[idx]))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.read().by_name.contains_key(name)
    }

    /// The most recently registered cog that was actually invoked
    /// (skipped cogs don't count). Source of a scope's default final
    /// output.
    pub fn last_invoked(&self) -> Option<Arc<CogCell>> {
        self.inner
            .read()
            .order
            .iter()
            .rev()
            .find(|cell| !cell.skipped())
            .map(Arc::clone)
    }

    /// All cells in insertion order.
    pub fn cells(&self) -> Vec<Arc<CogCell>> {
        self.inner.read().order.clone()
    }

    pub fn len(&self) -> usize {
        self.inner.read().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().order.is_empty()
    }
}
