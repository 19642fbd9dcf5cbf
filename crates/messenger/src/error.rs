use relay_kernel::KernelError;

/// Errors surfaced by messenger operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MessengerError {
	/// The messenger was disposed; no further subscriptions or publishes are
	/// accepted.
	#[error("messenger is disposed")]
	Disposed,

	/// An operation on the underlying component owner failed.
	#[error(transparent)]
	Kernel(#[from] KernelError),
}
