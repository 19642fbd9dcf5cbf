//! Subscriber handles, identity, and handling outcomes.

use std::any::{Any, TypeId};
use std::marker::PhantomData;
use std::sync::{Arc, Weak};

use relay_dispatch::ExecutionMode;

use crate::context::MessageContext;

/// Outcome of one subscriber's attempt to process a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlingResult {
	/// The subscriber consumed the message.
	Handled,
	/// The subscriber is present but the message is not relevant. Not an
	/// error, and never a reason for removal.
	Ignored,
	/// The subscriber target is no longer resolvable; the messenger removes
	/// it as a side effect of the dispatch.
	Invalid,
}

/// A registered receiver of published messages.
pub trait MessageSubscriber: Send + Sync + 'static {
	/// Reports whether this subscriber is interested in the concrete message
	/// type. Used when dispatch bundles are computed.
	fn can_handle(&self, message_type: TypeId) -> bool;

	/// Processes one message.
	fn handle(&self, ctx: &MessageContext) -> HandlingResult;
}

/// Identity of a subscriber: the address of its allocation. Equality of
/// registry entries uses this id only, ignoring the execution mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(usize);

impl SubscriberId {
	/// Returns the raw address value.
	#[inline]
	pub fn as_usize(self) -> usize {
		self.0
	}
}

impl std::fmt::Display for SubscriberId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "SubscriberId({:#x})", self.0)
	}
}

/// Ownership policy for a registered subscriber.
///
/// A weak handle does not keep the subscriber alive; it is resolved at
/// dispatch time, and a dead target surfaces as [`HandlingResult::Invalid`],
/// which triggers automatic unsubscription.
#[derive(Clone)]
pub enum SubscriberHandle {
	/// The registry keeps the subscriber alive.
	Strong(Arc<dyn MessageSubscriber>),
	/// The registry observes the subscriber without owning it.
	Weak(Weak<dyn MessageSubscriber>),
}

impl SubscriberHandle {
	/// Creates a strong handle.
	pub fn strong<S: MessageSubscriber>(subscriber: Arc<S>) -> Self {
		Self::Strong(subscriber)
	}

	/// Creates a weak handle.
	pub fn weak<S: MessageSubscriber>(subscriber: &Arc<S>) -> Self {
		let subscriber: Arc<dyn MessageSubscriber> = subscriber.clone();
		Self::Weak(Arc::downgrade(&subscriber))
	}

	/// The subscriber identity this handle refers to.
	pub fn id(&self) -> SubscriberId {
		match self {
			Self::Strong(subscriber) => {
				SubscriberId(Arc::as_ptr(subscriber) as *const () as usize)
			}
			Self::Weak(subscriber) => SubscriberId(subscriber.as_ptr() as *const () as usize),
		}
	}

	/// Resolves the handle to a live subscriber, if any.
	pub fn resolve(&self) -> Option<Arc<dyn MessageSubscriber>> {
		match self {
			Self::Strong(subscriber) => Some(subscriber.clone()),
			Self::Weak(subscriber) => subscriber.upgrade(),
		}
	}

	/// Returns true for weakly-held handles.
	pub fn is_weak(&self) -> bool {
		matches!(self, Self::Weak(_))
	}
}

impl From<Arc<dyn MessageSubscriber>> for SubscriberHandle {
	fn from(subscriber: Arc<dyn MessageSubscriber>) -> Self {
		Self::Strong(subscriber)
	}
}

impl std::fmt::Debug for SubscriberHandle {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let kind = if self.is_weak() { "Weak" } else { "Strong" };
		write!(f, "SubscriberHandle::{}({})", kind, self.id())
	}
}

/// One registry entry: a subscriber handle plus the execution mode its
/// dispatches run under.
#[derive(Debug, Clone)]
pub struct SubscriberEntry {
	handle: SubscriberHandle,
	mode: ExecutionMode,
}

impl SubscriberEntry {
	/// Creates an entry.
	pub fn new(handle: SubscriberHandle, mode: ExecutionMode) -> Self {
		Self { handle, mode }
	}

	/// The subscriber identity.
	#[inline]
	pub fn id(&self) -> SubscriberId {
		self.handle.id()
	}

	/// The execution mode dispatches run under.
	#[inline]
	pub fn mode(&self) -> ExecutionMode {
		self.mode
	}

	/// The underlying handle.
	#[inline]
	pub fn handle(&self) -> &SubscriberHandle {
		&self.handle
	}
}

impl PartialEq for SubscriberEntry {
	fn eq(&self, other: &Self) -> bool {
		self.id() == other.id()
	}
}

impl Eq for SubscriberEntry {}

impl std::hash::Hash for SubscriberEntry {
	fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
		self.id().hash(state);
	}
}

struct FnSubscriber<M, F> {
	f: F,
	_marker: PhantomData<fn(&M)>,
}

impl<M, F> MessageSubscriber for FnSubscriber<M, F>
where
	M: Any + Send + Sync,
	F: Fn(&M, &MessageContext) -> HandlingResult + Send + Sync + 'static,
{
	fn can_handle(&self, message_type: TypeId) -> bool {
		message_type == TypeId::of::<M>()
	}

	fn handle(&self, ctx: &MessageContext) -> HandlingResult {
		match ctx.message_as::<M>() {
			Some(message) => (self.f)(message, ctx),
			None => HandlingResult::Ignored,
		}
	}
}

/// Creates a subscriber for one concrete message type from a closure.
pub fn from_fn<M, F>(f: F) -> Arc<dyn MessageSubscriber>
where
	M: Any + Send + Sync,
	F: Fn(&M, &MessageContext) -> HandlingResult + Send + Sync + 'static,
{
	Arc::new(FnSubscriber {
		f,
		_marker: PhantomData,
	})
}

#[cfg(test)]
mod tests {
	use super::*;

	struct Counting;

	impl MessageSubscriber for Counting {
		fn can_handle(&self, _message_type: TypeId) -> bool {
			true
		}

		fn handle(&self, _ctx: &MessageContext) -> HandlingResult {
			HandlingResult::Handled
		}
	}

	#[test]
	fn entry_equality_ignores_mode() {
		let subscriber = Arc::new(Counting);
		let a = SubscriberEntry::new(SubscriberHandle::strong(subscriber.clone()), ExecutionMode::Inline);
		let b = SubscriberEntry::new(SubscriberHandle::strong(subscriber), ExecutionMode::Main);
		assert_eq!(a, b);
	}

	#[test]
	fn weak_handle_shares_identity_with_strong() {
		let subscriber = Arc::new(Counting);
		let strong = SubscriberHandle::strong(subscriber.clone());
		let weak = SubscriberHandle::weak(&subscriber);
		assert_eq!(strong.id(), weak.id());
		assert!(weak.resolve().is_some());
		drop(subscriber);
		drop(strong);
		assert!(weak.resolve().is_none());
	}

	#[test]
	fn from_fn_filters_by_type() {
		struct Ping;
		let subscriber = from_fn::<Ping, _>(|_msg, _ctx| HandlingResult::Handled);
		assert!(subscriber.can_handle(TypeId::of::<Ping>()));
		assert!(!subscriber.can_handle(TypeId::of::<u32>()));

		let ctx = MessageContext::new(Arc::new(Ping));
		assert_eq!(subscriber.handle(&ctx), HandlingResult::Handled);
	}
}
