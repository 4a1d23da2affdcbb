//! Control-flow signals and scheduler outcomes (v0.1)
//!
//! Skip/Break/Next are deliberate short-circuits, not errors. Step
//! procedures surface them through [`Halt`]; the scheduler converts
//! them into the closed [`StepOutcome`]/[`RunOutcome`] types so every
//! catch boundary is an exhaustive match.

use std::fmt;
use std::sync::Arc;

use crate::cog::CogCell;
use crate::error::EngineError;

/// Deliberate short-circuit raised inside a step procedure.
///
/// - `Skip` aborts building the current cog's input; the cog is
///   recorded as skipped and never runs.
/// - `Break`/`Next` abort the enclosing repeat/map iteration and are
///   interpreted by the owning system cog, not by the scope loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Skip,
    Break,
    Next,
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::Skip => write!(f, "skip"),
            Signal::Break => write!(f, "break"),
            Signal::Next => write!(f, "next"),
        }
    }
}

/// Error channel of a step procedure: either a control signal or a
/// real failure. Both convert via `?` thanks to the `From` impls.
#[derive(Debug)]
pub enum Halt {
    Signal(Signal),
    Error(EngineError),
}

impl Halt {
    /// Shorthand for `Err(Halt::Signal(Signal::Skip))` in procedures.
    pub fn skip() -> Self {
        Halt::Signal(Signal::Skip)
    }

    pub fn break_loop() -> Self {
        Halt::Signal(Signal::Break)
    }

    pub fn next_iteration() -> Self {
        Halt::Signal(Signal::Next)
    }
}

impl From<Signal> for Halt {
    fn from(signal: Signal) -> Self {
        Halt::Signal(signal)
    }
}

impl From<EngineError> for Halt {
    fn from(err: EngineError) -> Self {
        Halt::Error(err)
    }
}

/// What evaluating one step produced.
#[derive(Debug)]
pub enum StepOutcome {
    /// A cog was registered (and launched, or scheduled as a task).
    Ran(Arc<CogCell>),
    /// The procedure signalled skip; the cog is registered as skipped.
    Skipped,
    /// Break escaped the step; the scope run ends early.
    Break,
    /// Next escaped the step; the scope run ends early.
    Next,
}

/// How a scope invocation ended. A `Signalled` outcome is interpreted
/// by the caller: `call` treats it as an early return, `map`/`repeat`
/// apply their iteration semantics, and the top-level run reports a
/// stray-signal configuration error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    Signalled(Signal),
}

impl RunOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, RunOutcome::Completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_display() {
        assert_eq!(Signal::Skip.to_string(), "skip");
        assert_eq!(Signal::Break.to_string(), "break");
        assert_eq!(Signal::Next.to_string(), "next");
    }

    #[test]
    fn halt_from_signal_and_error() {
        assert!(matches!(Halt::from(Signal::Break), Halt::Signal(Signal::Break)));
        let halt = Halt::from(EngineError::Execution("boom".to_string()));
        assert!(matches!(halt, Halt::Error(EngineError::Execution(_))));
    }

    #[test]
    fn halt_shorthands() {
        assert!(matches!(Halt::skip(), Halt::Signal(Signal::Skip)));
        assert!(matches!(Halt::break_loop(), Halt::Signal(Signal::Break)));
        assert!(matches!(Halt::next_iteration(), Halt::Signal(Signal::Next)));
    }
}
