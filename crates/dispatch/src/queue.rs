use std::collections::VecDeque;

use parking_lot::Mutex;

use crate::dispatcher::{DispatchBlock, ThreadDispatcher};
use crate::mode::{ExecutionMode, ModeScope};

/// Dispatcher with explicit per-mode queues.
///
/// `Inline` blocks run immediately; `Main` and `Background` blocks are
/// enqueued until the embedding loop calls [`drain`](Self::drain) for that
/// mode. This is the integration point for applications that pump a main
/// loop themselves, and the deterministic dispatcher for tests.
#[derive(Default)]
pub struct QueueDispatcher {
	main: Mutex<VecDeque<DispatchBlock>>,
	background: Mutex<VecDeque<DispatchBlock>>,
}

impl QueueDispatcher {
	/// Creates a dispatcher with empty queues.
	pub fn new() -> Self {
		Self::default()
	}

	/// Runs every block currently queued for `mode` on the calling thread,
	/// tagged with that mode. Returns the number of blocks run. `Inline`
	/// never queues, so draining it is a no-op.
	pub fn drain(&self, mode: ExecutionMode) -> usize {
		let Some(queue) = self.queue(mode) else {
			return 0;
		};
		let drained: Vec<DispatchBlock> = {
			let mut queue = queue.lock();
			queue.drain(..).collect()
		};
		let count = drained.len();
		let _scope = ModeScope::enter(mode);
		for block in drained {
			block();
		}
		count
	}

	/// Number of blocks waiting for `mode`.
	pub fn pending(&self, mode: ExecutionMode) -> usize {
		self.queue(mode).map_or(0, |queue| queue.lock().len())
	}

	fn queue(&self, mode: ExecutionMode) -> Option<&Mutex<VecDeque<DispatchBlock>>> {
		match mode {
			ExecutionMode::Inline => None,
			ExecutionMode::Main => Some(&self.main),
			ExecutionMode::Background => Some(&self.background),
		}
	}
}

impl ThreadDispatcher for QueueDispatcher {
	fn execute(&self, mode: ExecutionMode, block: DispatchBlock) {
		match self.queue(mode) {
			None => {
				tracing::trace!(mode = mode.as_str(), "dispatch.queue.run");
				let _scope = ModeScope::enter(mode);
				block();
			}
			Some(queue) => {
				tracing::trace!(mode = mode.as_str(), "dispatch.queue.defer");
				queue.lock().push_back(block);
			}
		}
	}
}

impl std::fmt::Debug for QueueDispatcher {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("QueueDispatcher")
			.field("pending_main", &self.pending(ExecutionMode::Main))
			.field("pending_background", &self.pending(ExecutionMode::Background))
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;
	use std::sync::atomic::{AtomicUsize, Ordering};

	use super::*;

	fn counting_block(counter: &Arc<AtomicUsize>, expected: ExecutionMode) -> DispatchBlock {
		let counter = counter.clone();
		Box::new(move || {
			assert_eq!(ExecutionMode::current(), expected);
			counter.fetch_add(1, Ordering::SeqCst);
		})
	}

	#[test]
	fn inline_runs_immediately() {
		let dispatcher = QueueDispatcher::new();
		let counter = Arc::new(AtomicUsize::new(0));
		dispatcher.execute(
			ExecutionMode::Inline,
			counting_block(&counter, ExecutionMode::Inline),
		);
		assert_eq!(counter.load(Ordering::SeqCst), 1);
	}

	#[test]
	fn main_defers_until_drain() {
		let dispatcher = QueueDispatcher::new();
		let counter = Arc::new(AtomicUsize::new(0));
		dispatcher.execute(
			ExecutionMode::Main,
			counting_block(&counter, ExecutionMode::Main),
		);
		dispatcher.execute(
			ExecutionMode::Main,
			counting_block(&counter, ExecutionMode::Main),
		);
		assert_eq!(counter.load(Ordering::SeqCst), 0);
		assert_eq!(dispatcher.pending(ExecutionMode::Main), 2);
		assert_eq!(dispatcher.drain(ExecutionMode::Main), 2);
		assert_eq!(counter.load(Ordering::SeqCst), 2);
		assert_eq!(dispatcher.pending(ExecutionMode::Main), 0);
	}

	#[test]
	fn queues_are_independent() {
		let dispatcher = QueueDispatcher::new();
		let counter = Arc::new(AtomicUsize::new(0));
		dispatcher.execute(
			ExecutionMode::Background,
			counting_block(&counter, ExecutionMode::Background),
		);
		assert_eq!(dispatcher.drain(ExecutionMode::Main), 0);
		assert_eq!(counter.load(Ordering::SeqCst), 0);
		assert_eq!(dispatcher.drain(ExecutionMode::Background), 1);
		assert_eq!(counter.load(Ordering::SeqCst), 1);
	}
}
