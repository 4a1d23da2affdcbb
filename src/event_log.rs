//! Event sourcing for workflow execution (v0.1)
//!
//! Provides a full audit trail across nested scope invocations.
//! - Event: envelope with id + timestamp + kind
//! - EventKind: scope-level and cog-level variants
//! - EventLog: thread-safe, append-only log shared down to every
//!   nested execution manager

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Single event in the execution log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Monotonic sequence ID (for ordering)
    pub id: u64,
    /// Time since log creation (ms)
    pub timestamp_ms: u64,
    /// Event type and data
    pub kind: EventKind,
}

/// All possible event types
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    // ═══════════════════════════════════════════
    // SCOPE LEVEL
    // ═══════════════════════════════════════════
    ScopeStarted {
        scope: String,
        steps: usize,
    },
    ScopeCompleted {
        scope: String,
        duration_ms: u64,
    },
    ScopeFailed {
        scope: String,
        error: String,
    },
    /// A break/next signal ended the scope run early
    SignalRaised {
        scope: String,
        signal: String,
    },

    // ═══════════════════════════════════════════
    // COG LEVEL
    // ═══════════════════════════════════════════
    CogStarted {
        scope: String,
        cog: String,
        cog_kind: String,
    },
    CogCompleted {
        scope: String,
        cog: String,
        duration_ms: u64,
    },
    CogFailed {
        scope: String,
        cog: String,
        error: String,
        duration_ms: u64,
    },
    CogSkipped {
        scope: String,
        cog: String,
    },
}

impl EventKind {
    /// Extract the cog name if this is a cog-level event
    pub fn cog(&self) -> Option<&str> {
        match self {
            Self::CogStarted { cog, .. }
            | Self::CogCompleted { cog, .. }
            | Self::CogFailed { cog, .. }
            | Self::CogSkipped { cog, .. } => Some(cog),
            Self::ScopeStarted { .. }
            | Self::ScopeCompleted { .. }
            | Self::ScopeFailed { .. }
            | Self::SignalRaised { .. } => None,
        }
    }

    pub fn scope(&self) -> &str {
        match self {
            Self::ScopeStarted { scope, .. }
            | Self::ScopeCompleted { scope, .. }
            | Self::ScopeFailed { scope, .. }
            | Self::SignalRaised { scope, .. }
            | Self::CogStarted { scope, .. }
            | Self::CogCompleted { scope, .. }
            | Self::CogFailed { scope, .. }
            | Self::CogSkipped { scope, .. } => scope,
        }
    }

    pub fn is_scope_event(&self) -> bool {
        self.cog().is_none()
    }
}

/// Thread-safe, append-only event log
#[derive(Clone)]
pub struct EventLog {
    events: Arc<RwLock<Vec<Event>>>,
    start_time: Instant,
    next_id: Arc<AtomicU64>,
}

impl EventLog {
    /// Create a new event log (call at workflow start)
    pub fn new() -> Self {
        Self {
            events: Arc::new(RwLock::new(Vec::new())),
            start_time: Instant::now(),
            next_id: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Emit an event (thread-safe, returns event ID)
    pub fn emit(&self, kind: EventKind) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let event = Event {
            id,
            timestamp_ms: self.start_time.elapsed().as_millis() as u64,
            kind,
        };

        self.events.write().push(event);
        id
    }

    /// Get all events (cloned)
    pub fn events(&self) -> Vec<Event> {
        self.events.read().clone()
    }

    /// Filter events by cog name
    pub fn filter_cog(&self, cog: &str) -> Vec<Event> {
        self.events()
            .into_iter()
            .filter(|e| e.kind.cog() == Some(cog))
            .collect()
    }

    /// Filter events by scope name
    pub fn filter_scope(&self, scope: &str) -> Vec<Event> {
        self.events()
            .into_iter()
            .filter(|e| e.kind.scope() == scope)
            .collect()
    }

    /// Cog names in completion order (successful completions only)
    pub fn completions(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e.kind {
                EventKind::CogCompleted { cog, .. } => Some(cog),
                _ => None,
            })
            .collect()
    }

    /// Serialize to JSON for persistence/debugging
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self.events()).unwrap_or(Value::Null)
    }

    /// Number of events
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLog").field("len", &self.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn started(scope: &str, cog: &str) -> EventKind {
        EventKind::CogStarted {
            scope: scope.to_string(),
            cog: cog.to_string(),
            cog_kind: "fn".to_string(),
        }
    }

    fn completed(scope: &str, cog: &str) -> EventKind {
        EventKind::CogCompleted {
            scope: scope.to_string(),
            cog: cog.to_string(),
            duration_ms: 1,
        }
    }

    #[test]
    fn emit_returns_monotonic_ids() {
        let log = EventLog::new();
        let id1 = log.emit(EventKind::ScopeStarted {
            scope: "main".to_string(),
            steps: 2,
        });
        let id2 = log.emit(started("main", "a"));
        assert_eq!(id1, 0);
        assert_eq!(id2, 1);
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn filter_cog_returns_only_matching() {
        let log = EventLog::new();
        log.emit(started("main", "alpha"));
        log.emit(started("main", "beta"));
        log.emit(completed("main", "alpha"));

        let alpha = log.filter_cog("alpha");
        assert_eq!(alpha.len(), 2);
        assert!(alpha.iter().all(|e| e.kind.cog() == Some("alpha")));
    }

    #[test]
    fn filter_scope_includes_scope_and_cog_events() {
        let log = EventLog::new();
        log.emit(EventKind::ScopeStarted {
            scope: "body".to_string(),
            steps: 1,
        });
        log.emit(started("body", "x"));
        log.emit(started("main", "y"));

        assert_eq!(log.filter_scope("body").len(), 2);
        assert_eq!(log.filter_scope("main").len(), 1);
    }

    #[test]
    fn completions_are_in_emit_order() {
        let log = EventLog::new();
        log.emit(started("main", "a"));
        log.emit(started("main", "b"));
        log.emit(completed("main", "b"));
        log.emit(completed("main", "a"));

        assert_eq!(log.completions(), ["b", "a"]);
    }

    #[test]
    fn kind_serializes_with_type_tag() {
        let kind = completed("main", "greet");
        let json = serde_json::to_value(&kind).unwrap();
        assert_eq!(json["type"], "cog_completed");
        assert_eq!(json["cog"], "greet");
    }

    #[test]
    fn clones_share_the_log() {
        let log = EventLog::new();
        let cloned = log.clone();
        log.emit(started("main", "a"));
        assert_eq!(cloned.len(), 1);
    }

    #[test]
    fn thread_safe_concurrent_emits() {
        use std::thread;

        let log = EventLog::new();
        let handles: Vec<_> = (0..10)
            .map(|i| {
                let log = log.clone();
                thread::spawn(move || log.emit(started("main", &format!("cog{i}"))))
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(log.len(), 10);
        let mut ids: Vec<u64> = log.events().iter().map(|e| e.id).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 10);
    }
}
