use crate::mode::{ExecutionMode, ModeScope};

/// A unit of work submitted to a dispatcher.
pub type DispatchBlock = Box<dyn FnOnce() + Send + 'static>;

/// Accepts tagged units of work and decides when and where they execute.
///
/// Implementations may run a block synchronously before returning or defer
/// it; either way a panic inside the block propagates through the
/// implementation's execution path and is never swallowed here.
pub trait ThreadDispatcher: Send + Sync + 'static {
	/// Submits `block` for execution under `mode`.
	fn execute(&self, mode: ExecutionMode, block: DispatchBlock);
}

/// Dispatcher that runs every block immediately on the calling thread,
/// regardless of mode. The block still observes the tagged mode via
/// [`ExecutionMode::current`].
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineDispatcher;

impl InlineDispatcher {
	/// Creates an inline dispatcher.
	pub fn new() -> Self {
		Self
	}
}

impl ThreadDispatcher for InlineDispatcher {
	fn execute(&self, mode: ExecutionMode, block: DispatchBlock) {
		tracing::trace!(mode = mode.as_str(), "dispatch.inline");
		let _scope = ModeScope::enter(mode);
		block();
	}
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;
	use std::sync::atomic::{AtomicUsize, Ordering};

	use super::*;

	#[test]
	fn inline_runs_before_returning() {
		let dispatcher = InlineDispatcher::new();
		let ran = Arc::new(AtomicUsize::new(0));
		let ran_in_block = ran.clone();
		dispatcher.execute(
			ExecutionMode::Background,
			Box::new(move || {
				assert_eq!(ExecutionMode::current(), ExecutionMode::Background);
				ran_in_block.fetch_add(1, Ordering::SeqCst);
			}),
		);
		assert_eq!(ran.load(Ordering::SeqCst), 1);
		assert_eq!(ExecutionMode::current(), ExecutionMode::Inline);
	}
}
