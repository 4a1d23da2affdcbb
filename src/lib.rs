//! Cogflow - workflow execution engine for heterogeneous cogs
//!
//! Orchestrates units of work ("cogs") into pipelines with data
//! dependencies, sub-scopes, loops, maps, and mixed sync/async
//! execution. The scheduler runs a scope's steps in declaration
//! order; async cogs keep running in the background while later steps
//! execute, and accessing their output blocks only when necessary.
//! Nested scope invocations (`call`/`map`/`repeat`) each get an
//! isolated cog namespace, observable from outside only through
//! read-only invocation handles.

pub mod builders;
pub mod cog;
pub mod cogs;
pub mod command_runner;
pub mod config;
pub mod context;
pub mod control;
pub mod error;
pub mod event_log;
pub mod extract;
pub mod input;
pub mod manager;
pub mod output;
pub mod registry;
pub mod scope;
pub mod store;
pub mod system;

pub use builders::{ScopeBuilder, WorkflowBuilder};
pub use cog::{Cog, CogCell, CogState, ExecEnv, Invocation};
pub use command_runner::{CommandOutcome, CommandRequest, CommandRunner};
pub use config::{CogConfig, ConfigManager, Parallelism};
pub use context::{ScopeHandle, StepContext};
pub use control::{Halt, RunOutcome, Signal, StepOutcome};
pub use error::{EngineError, FixSuggestion};
pub use event_log::{Event, EventKind, EventLog};
pub use input::CogInput;
pub use manager::{Engine, ExecutionManager};
pub use output::{CallOutput, CogOutput, MapOutput, RepeatOutput};
pub use registry::CogRegistry;
pub use scope::{ProcResult, ScopeDef, Step, WorkflowDef};
pub use store::CogStore;
