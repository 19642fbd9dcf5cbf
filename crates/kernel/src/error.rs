/// Kernel-level errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KernelError {
	/// The component owner has been disposed; no further mutation is allowed.
	#[error("component owner is disposed")]
	Disposed,
}
