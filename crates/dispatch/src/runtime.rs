use std::collections::VecDeque;
use std::sync::OnceLock;

use parking_lot::Mutex;

use crate::dispatcher::{DispatchBlock, ThreadDispatcher};
use crate::mode::{ExecutionMode, ModeScope};

fn runtime_handle() -> tokio::runtime::Handle {
	if let Ok(handle) = tokio::runtime::Handle::try_current() {
		return handle;
	}

	static GLOBAL_RT: OnceLock<tokio::runtime::Runtime> = OnceLock::new();
	let runtime = GLOBAL_RT.get_or_init(|| {
		tokio::runtime::Builder::new_multi_thread()
			.worker_threads(2)
			.thread_name("relay-dispatch-global")
			.build()
			.expect("failed to build relay-dispatch global tokio runtime")
	});
	runtime.handle().clone()
}

/// Tokio-backed dispatcher.
///
/// `Inline` runs immediately on the calling thread; `Background` goes to the
/// ambient runtime's blocking pool (or a shared fallback runtime when no
/// runtime is entered); `Main` is enqueued for the application's main loop,
/// which pumps it via [`drain_main`](Self::drain_main).
#[derive(Default)]
pub struct RuntimeDispatcher {
	main: Mutex<VecDeque<DispatchBlock>>,
}

impl RuntimeDispatcher {
	/// Creates a runtime dispatcher with an empty main queue.
	pub fn new() -> Self {
		Self::default()
	}

	/// Runs every block currently queued for the main loop on the calling
	/// thread. Returns the number of blocks run.
	pub fn drain_main(&self) -> usize {
		let drained: Vec<DispatchBlock> = {
			let mut queue = self.main.lock();
			queue.drain(..).collect()
		};
		let count = drained.len();
		let _scope = ModeScope::enter(ExecutionMode::Main);
		for block in drained {
			block();
		}
		count
	}

	/// Number of blocks waiting for the main loop.
	pub fn pending_main(&self) -> usize {
		self.main.lock().len()
	}
}

impl ThreadDispatcher for RuntimeDispatcher {
	fn execute(&self, mode: ExecutionMode, block: DispatchBlock) {
		match mode {
			ExecutionMode::Inline => {
				tracing::trace!(mode = mode.as_str(), "dispatch.runtime.run");
				let _scope = ModeScope::enter(mode);
				block();
			}
			ExecutionMode::Main => {
				tracing::trace!(mode = mode.as_str(), "dispatch.runtime.defer");
				self.main.lock().push_back(block);
			}
			ExecutionMode::Background => {
				tracing::trace!(mode = mode.as_str(), "dispatch.runtime.spawn_blocking");
				let _ = runtime_handle().spawn_blocking(move || {
					let _scope = ModeScope::enter(ExecutionMode::Background);
					block();
				});
			}
		}
	}
}

impl std::fmt::Debug for RuntimeDispatcher {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("RuntimeDispatcher")
			.field("pending_main", &self.pending_main())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use std::sync::mpsc;
	use std::time::Duration;

	use super::*;

	#[test]
	fn background_runs_off_thread() {
		let dispatcher = RuntimeDispatcher::new();
		let (tx, rx) = mpsc::channel();
		dispatcher.execute(
			ExecutionMode::Background,
			Box::new(move || {
				let _ = tx.send(ExecutionMode::current());
			}),
		);
		let mode = rx
			.recv_timeout(Duration::from_secs(5))
			.expect("background block did not run");
		assert_eq!(mode, ExecutionMode::Background);
	}

	#[test]
	fn main_waits_for_drain() {
		let dispatcher = RuntimeDispatcher::new();
		let (tx, rx) = mpsc::channel();
		dispatcher.execute(
			ExecutionMode::Main,
			Box::new(move || {
				let _ = tx.send(());
			}),
		);
		assert_eq!(dispatcher.pending_main(), 1);
		assert!(rx.try_recv().is_err());
		assert_eq!(dispatcher.drain_main(), 1);
		assert!(rx.try_recv().is_ok());
	}
}
