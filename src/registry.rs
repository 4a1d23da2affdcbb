//! Cog kind registry (v0.1)
//!
//! Maps kind tags ("cmd", "fn", "call", ...) to implementations.
//! Lock-free via DashMap; constructed once and injected into every
//! execution manager.

use std::sync::Arc;

use dashmap::DashMap;

use crate::cog::Cog;
use crate::cogs::{CommandCog, FunctionCog, MockCog};
use crate::system::{CallCog, MapCog, RepeatCog};

#[derive(Clone, Default)]
pub struct CogRegistry {
    cogs: Arc<DashMap<String, Arc<dyn Cog>>>,
}

impl CogRegistry {
    /// An empty registry. Most callers want [`with_builtins`].
    ///
    /// [`with_builtins`]: CogRegistry::with_builtins
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-loaded with the built-in kinds: `fn`, `cmd`,
    /// `mock` and the system cogs `call`, `map`, `repeat`.
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        registry.register(Arc::new(FunctionCog));
        registry.register(Arc::new(CommandCog::new()));
        registry.register(Arc::new(MockCog));
        registry.register(Arc::new(CallCog));
        registry.register(Arc::new(MapCog));
        registry.register(Arc::new(RepeatCog));
        registry
    }

    /// Register an implementation under its own kind tag. Replaces
    /// any previous registration for that kind.
    pub fn register(&self, cog: Arc<dyn Cog>) {
        self.cogs.insert(cog.kind().to_string(), cog);
    }

    pub fn get(&self, kind: &str) -> Option<Arc<dyn Cog>> {
        self.cogs.get(kind).map(|entry| Arc::clone(entry.value()))
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.cogs.contains_key(kind)
    }

    pub fn kinds(&self) -> Vec<String> {
        let mut kinds: Vec<String> = self.cogs.iter().map(|e| e.key().clone()).collect();
        kinds.sort();
        kinds
    }
}

impl std::fmt::Debug for CogRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CogRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}
