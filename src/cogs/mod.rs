//! Built-in cog implementations (v0.1)
//!
//! The scheduler is agnostic to what a kind does; these are the
//! implementations shipped with the crate. Richer kinds (LLM chat,
//! coding agents) plug in through the same [`Cog`](crate::cog::Cog)
//! trait from outside.

mod command;
mod function;
mod mock;

pub use command::CommandCog;
pub use function::FunctionCog;
pub use mock::MockCog;
