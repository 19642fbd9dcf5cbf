//! Execution-mode tags and thread dispatchers.
//!
//! A dispatcher accepts a unit of work tagged with an [`ExecutionMode`] and
//! decides when and where it runs: immediately on the calling thread,
//! deferred into a queue drained by a main loop, or on a background pool.
//! Callers must not assume a submitted block has executed by the time
//! [`ThreadDispatcher::execute`] returns.

mod dispatcher;
mod mode;
mod queue;
mod runtime;

pub use dispatcher::{DispatchBlock, InlineDispatcher, ThreadDispatcher};
pub use mode::{ExecutionMode, ModeScope};
pub use queue::QueueDispatcher;
pub use runtime::RuntimeDispatcher;
