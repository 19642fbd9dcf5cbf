use std::cell::Cell;

/// Thread-affinity tag controlling where a dispatch group runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutionMode {
	/// Run on the calling thread, immediately.
	Inline,
	/// Run on the application's main loop.
	Main,
	/// Run on a background pool.
	Background,
}

thread_local! {
	static CURRENT: Cell<ExecutionMode> = const { Cell::new(ExecutionMode::Inline) };
}

impl ExecutionMode {
	/// Stable name for tracing fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Inline => "inline",
			Self::Main => "main",
			Self::Background => "background",
		}
	}

	/// The mode the current thread is executing under.
	///
	/// Dispatchers tag the threads and queues they drain via [`ModeScope`];
	/// untagged threads report [`ExecutionMode::Inline`].
	pub fn current() -> Self {
		CURRENT.get()
	}
}

/// RAII guard tagging the current thread with an execution mode; restores
/// the previous mode on drop.
#[derive(Debug)]
pub struct ModeScope {
	previous: ExecutionMode,
}

impl ModeScope {
	/// Tags the current thread with `mode` until the guard drops.
	pub fn enter(mode: ExecutionMode) -> Self {
		Self {
			previous: CURRENT.replace(mode),
		}
	}
}

impl Drop for ModeScope {
	fn drop(&mut self) {
		CURRENT.set(self.previous);
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn untagged_thread_is_inline() {
		assert_eq!(ExecutionMode::current(), ExecutionMode::Inline);
	}

	#[test]
	fn scopes_nest_and_restore() {
		let outer = ModeScope::enter(ExecutionMode::Main);
		assert_eq!(ExecutionMode::current(), ExecutionMode::Main);
		{
			let _inner = ModeScope::enter(ExecutionMode::Background);
			assert_eq!(ExecutionMode::current(), ExecutionMode::Background);
		}
		assert_eq!(ExecutionMode::current(), ExecutionMode::Main);
		drop(outer);
		assert_eq!(ExecutionMode::current(), ExecutionMode::Inline);
	}
}
