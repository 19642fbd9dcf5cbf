//! The messenger: subscriber registry, dispatch cache, and publish loop.

use std::any::{Any, TypeId};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use relay_dispatch::{ExecutionMode, ThreadDispatcher};
use relay_kernel::{
	AttachListener, CapabilityRef, Component, ComponentId, ComponentOwner, Metadata,
	impl_component,
};
use rustc_hash::FxHashMap;
use tracing::trace;

use crate::components::{
	HandlerListener, MessengerHandler, StandardHandler, StandardResolver, SubscriberResolver,
	SubscriptionListener,
};
use crate::context::MessageContext;
use crate::error::MessengerError;
use crate::subscriber::{HandlingResult, SubscriberEntry, SubscriberHandle, SubscriberId};

/// One entry paired with the handler that claimed it for a message type.
#[derive(Clone)]
struct DispatchItem {
	entry: SubscriberEntry,
	handler: CapabilityRef<dyn MessengerHandler>,
}

/// The items of one execution mode, in subscription order.
#[derive(Clone)]
struct DispatchGroup {
	mode: ExecutionMode,
	items: Arc<[DispatchItem]>,
}

/// Precomputed dispatch plan for one message type. Groups appear in the
/// order their mode first occurs among the subscribers.
#[derive(Clone)]
struct DispatchBundle {
	groups: Arc<[DispatchGroup]>,
}

#[derive(Default)]
struct MessengerState {
	subscribers: Vec<SubscriberEntry>,
	cache: FxHashMap<TypeId, DispatchBundle>,
	disposed: bool,
}

pub(crate) struct MessengerInner {
	owner: ComponentOwner,
	dispatcher: Arc<dyn ThreadDispatcher>,
	state: Mutex<MessengerState>,
}

/// Typed publish/subscribe hub.
///
/// Subscribers register with an [`ExecutionMode`]; publishes resolve a
/// cached dispatch bundle for the message's concrete type and hand one block
/// per mode group to the [`ThreadDispatcher`]. Cloning the messenger clones
/// a handle to the same registry.
#[derive(Clone)]
pub struct Messenger {
	inner: Arc<MessengerInner>,
}

/// Invalidates the dispatch cache whenever the owner's component set
/// changes, since bundles bake in handler resolution.
struct CacheInvalidator {
	inner: Weak<MessengerInner>,
}

impl AttachListener for CacheInvalidator {
	fn on_attached(
		&self,
		_owner: &ComponentOwner,
		_id: ComponentId,
		_component: &Arc<dyn Component>,
		_metadata: Option<&Metadata>,
	) {
		self.invalidate();
	}

	fn on_detached(
		&self,
		_owner: &ComponentOwner,
		_id: ComponentId,
		_component: &Arc<dyn Component>,
		_metadata: Option<&Metadata>,
	) {
		self.invalidate();
	}
}

impl CacheInvalidator {
	fn invalidate(&self) {
		let Some(inner) = self.inner.upgrade() else {
			return;
		};
		let mut state = inner.state.lock();
		if !state.cache.is_empty() {
			trace!(entries = state.cache.len(), "messenger.cache.invalidate");
			state.cache.clear();
		}
	}
}

impl_component!(CacheInvalidator, caps = [dyn AttachListener]);

impl Messenger {
	/// Creates a messenger over a fresh component owner, with the standard
	/// resolver and handler installed.
	pub fn new(dispatcher: Arc<dyn ThreadDispatcher>) -> Self {
		Self::with_owner(ComponentOwner::new(), dispatcher)
			.expect("fresh owner is never disposed")
	}

	/// Creates a messenger over an existing owner, installing the standard
	/// resolver, the standard handler, and the cache invalidator. Components
	/// already on the owner are kept and participate in dispatch.
	pub fn with_owner(
		owner: ComponentOwner,
		dispatcher: Arc<dyn ThreadDispatcher>,
	) -> Result<Self, MessengerError> {
		let inner = Arc::new(MessengerInner {
			owner,
			dispatcher,
			state: Mutex::new(MessengerState::default()),
		});
		inner.owner.add(Arc::new(StandardResolver))?;
		inner.owner.add(Arc::new(StandardHandler))?;
		inner.owner.add(Arc::new(CacheInvalidator {
			inner: Arc::downgrade(&inner),
		}))?;
		Ok(Self { inner })
	}

	/// The component owner holding this messenger's capability components.
	/// Add resolver, handler, condition, or listener components here.
	pub fn owner(&self) -> &ComponentOwner {
		&self.inner.owner
	}

	/// Registers a subscriber under the calling thread's current mode.
	pub fn subscribe(&self, handle: SubscriberHandle) -> Result<bool, MessengerError> {
		self.subscribe_with(handle, None, None)
	}

	/// Registers a subscriber with an explicit mode and optional metadata
	/// forwarded to subscription listeners.
	///
	/// Re-subscribing the same allocation replaces the existing entry (the
	/// mode may change) and returns `Ok(false)`.
	pub fn subscribe_with(
		&self,
		handle: SubscriberHandle,
		mode: Option<ExecutionMode>,
		metadata: Option<&Metadata>,
	) -> Result<bool, MessengerError> {
		let mode = mode.unwrap_or_else(ExecutionMode::current);
		let resolvers = self.inner.owner.components::<dyn SubscriberResolver>();
		let entries = resolvers
			.iter()
			.map(|resolver| resolver.resolve(&handle, mode))
			.find(|entries| !entries.is_empty())
			.unwrap_or_default();

		let mut fresh = false;
		let registered = {
			let mut state = self.inner.state.lock();
			if state.disposed {
				return Err(MessengerError::Disposed);
			}
			let mut registered = Vec::with_capacity(entries.len());
			for entry in entries {
				match state.subscribers.iter_mut().find(|e| **e == entry) {
					Some(existing) => *existing = entry.clone(),
					None => {
						state.subscribers.push(entry.clone());
						fresh = true;
					}
				}
				registered.push(entry);
			}
			if !registered.is_empty() {
				state.cache.clear();
			}
			registered
		};

		let listeners = self.inner.owner.components::<dyn SubscriptionListener>();
		for entry in &registered {
			trace!(
				subscriber = entry.id().as_usize(),
				mode = entry.mode().as_str(),
				"messenger.subscribe"
			);
			for listener in listeners.iter() {
				listener.on_subscribed(entry, metadata);
			}
		}
		Ok(fresh)
	}

	/// Removes the subscriber with the given identity. Returns `Ok(false)`
	/// when no entry matches.
	pub fn unsubscribe(&self, id: SubscriberId) -> Result<bool, MessengerError> {
		self.unsubscribe_with(id, None)
	}

	/// [`unsubscribe`](Self::unsubscribe) with metadata forwarded to
	/// subscription listeners.
	pub fn unsubscribe_with(
		&self,
		id: SubscriberId,
		metadata: Option<&Metadata>,
	) -> Result<bool, MessengerError> {
		let removed = {
			let mut state = self.inner.state.lock();
			if state.disposed {
				return Err(MessengerError::Disposed);
			}
			let Some(index) = state.subscribers.iter().position(|e| e.id() == id) else {
				return Ok(false);
			};
			state.subscribers.remove(index);
			state.cache.clear();
			true
		};
		if removed {
			trace!(subscriber = id.as_usize(), "messenger.unsubscribe");
			for listener in self
				.inner
				.owner
				.components::<dyn SubscriptionListener>()
				.iter()
			{
				listener.on_unsubscribed(id, metadata);
			}
		}
		Ok(removed)
	}

	/// Current registry entries, in subscription order.
	pub fn subscribers(&self) -> Vec<SubscriberEntry> {
		self.inner.state.lock().subscribers.clone()
	}

	/// Number of registered subscribers.
	pub fn len(&self) -> usize {
		self.inner.state.lock().subscribers.len()
	}

	/// Returns true when no subscribers are registered.
	pub fn is_empty(&self) -> bool {
		self.inner.state.lock().subscribers.is_empty()
	}

	/// Publishes a message with no sender attribution.
	pub fn publish<M: Any + Send + Sync>(&self, message: M) -> Result<(), MessengerError> {
		self.publish_context(MessageContext::new(Arc::new(message)))
	}

	/// Publishes a message attributed to `sender`.
	pub fn publish_from<M: Any + Send + Sync>(
		&self,
		message: M,
		sender: Arc<dyn Any + Send + Sync>,
	) -> Result<(), MessengerError> {
		self.publish_context(MessageContext::with_sender(Arc::new(message), sender))
	}

	/// Publishes a prepared context. One block per mode group is submitted
	/// to the dispatcher; groups whose mode is `Inline` therefore run before
	/// this call returns when the dispatcher executes inline work eagerly.
	pub fn publish_context(&self, ctx: MessageContext) -> Result<(), MessengerError> {
		let message_type = ctx.message_type();
		let bundle = {
			let mut state = self.inner.state.lock();
			if state.disposed {
				return Err(MessengerError::Disposed);
			}
			match state.cache.get(&message_type) {
				Some(bundle) => bundle.clone(),
				None => {
					let bundle = self.inner.compute_bundle(&state.subscribers, message_type);
					state.cache.insert(message_type, bundle.clone());
					bundle
				}
			}
		};

		trace!(groups = bundle.groups.len(), "messenger.publish");
		let ctx = Arc::new(ctx);
		for group in bundle.groups.iter() {
			let inner = self.inner.clone();
			let items = group.items.clone();
			let ctx = ctx.clone();
			self.inner.dispatcher.execute(
				group.mode,
				Box::new(move || inner.dispatch_group(&items, &ctx)),
			);
		}
		Ok(())
	}

	/// Returns true once [`dispose`](Self::dispose) has run.
	pub fn is_disposed(&self) -> bool {
		self.inner.state.lock().disposed
	}

	/// Drops all subscribers, notifies subscription listeners, and disposes
	/// the underlying owner. Later operations fail with
	/// [`MessengerError::Disposed`]. Idempotent.
	pub fn dispose(&self) {
		let drained = {
			let mut state = self.inner.state.lock();
			if state.disposed {
				return;
			}
			state.disposed = true;
			state.cache.clear();
			std::mem::take(&mut state.subscribers)
		};
		trace!(subscribers = drained.len(), "messenger.dispose");
		let listeners = self.inner.owner.components::<dyn SubscriptionListener>();
		for entry in &drained {
			for listener in listeners.iter() {
				listener.on_unsubscribed(entry.id(), None);
			}
		}
		self.inner.owner.dispose();
	}
}

impl MessengerInner {
	/// Pairs each subscriber with the first handler claiming it for
	/// `message_type` and groups the pairs by execution mode, preserving
	/// subscription order within and across groups.
	fn compute_bundle(
		&self,
		subscribers: &[SubscriberEntry],
		message_type: TypeId,
	) -> DispatchBundle {
		let handlers = self.owner.components::<dyn MessengerHandler>();
		let mut groups: Vec<(ExecutionMode, Vec<DispatchItem>)> = Vec::new();
		for entry in subscribers {
			let Some(handler) = handlers
				.iter()
				.find(|handler| handler.can_handle(entry, message_type))
			else {
				continue;
			};
			let item = DispatchItem {
				entry: entry.clone(),
				handler: handler.clone(),
			};
			match groups.iter_mut().find(|(mode, _)| *mode == entry.mode()) {
				Some((_, items)) => items.push(item),
				None => groups.push((entry.mode(), vec![item])),
			}
		}
		DispatchBundle {
			groups: groups
				.into_iter()
				.map(|(mode, items)| DispatchGroup {
					mode,
					items: items.into(),
				})
				.collect(),
		}
	}

	/// Runs one mode group: listener hooks around every item, then automatic
	/// unsubscription of entries that reported [`HandlingResult::Invalid`].
	fn dispatch_group(self: &Arc<Self>, items: &Arc<[DispatchItem]>, ctx: &Arc<MessageContext>) {
		let listeners = self.owner.components::<dyn HandlerListener>();
		let mut invalid: Vec<SubscriberId> = Vec::new();
		for item in items.iter() {
			for listener in listeners.iter() {
				listener.on_handling(&item.entry, ctx);
			}
			let result = item.handler.handle(&item.entry, ctx);
			for listener in listeners.iter() {
				listener.on_handled(&item.entry, ctx, result);
			}
			if result == HandlingResult::Invalid {
				invalid.push(item.entry.id());
			}
		}
		for id in invalid {
			trace!(subscriber = id.as_usize(), "messenger.subscriber.invalid");
			// Dispatch may outlive a concurrent dispose; removal is then moot.
			let _ = Messenger {
				inner: self.clone(),
			}
			.unsubscribe(id);
		}
	}
}

impl std::fmt::Debug for Messenger {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let state = self.inner.state.lock();
		f.debug_struct("Messenger")
			.field("subscribers", &state.subscribers.len())
			.field("cached_types", &state.cache.len())
			.field("disposed", &state.disposed)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use std::sync::atomic::{AtomicUsize, Ordering};

	use relay_dispatch::InlineDispatcher;

	use super::*;
	use crate::subscriber::{MessageSubscriber, from_fn};

	struct Ping;
	struct Pong;

	fn inline_messenger() -> Messenger {
		Messenger::new(Arc::new(InlineDispatcher::new()))
	}

	#[test]
	fn publish_reaches_matching_subscriber() {
		let messenger = inline_messenger();
		let hits = Arc::new(AtomicUsize::new(0));
		let hits_in = hits.clone();
		let subscriber = from_fn::<Ping, _>(move |_msg, _ctx| {
			hits_in.fetch_add(1, Ordering::SeqCst);
			HandlingResult::Handled
		});
		messenger
			.subscribe(SubscriberHandle::Strong(subscriber))
			.unwrap();

		messenger.publish(Ping).unwrap();
		messenger.publish(Pong).unwrap();
		assert_eq!(hits.load(Ordering::SeqCst), 1);
	}

	#[test]
	fn resubscribe_replaces_entry() {
		let messenger = inline_messenger();
		let subscriber = from_fn::<Ping, _>(|_msg, _ctx| HandlingResult::Handled);
		let handle = SubscriberHandle::Strong(subscriber);

		assert_eq!(messenger.subscribe(handle.clone()), Ok(true));
		assert_eq!(
			messenger.subscribe_with(handle.clone(), Some(ExecutionMode::Main), None),
			Ok(false)
		);
		let entries = messenger.subscribers();
		assert_eq!(entries.len(), 1);
		assert_eq!(entries[0].mode(), ExecutionMode::Main);
	}

	#[test]
	fn dead_weak_subscriber_is_removed_by_publish() {
		let messenger = inline_messenger();
		struct Sink;
		impl MessageSubscriber for Sink {
			fn can_handle(&self, _t: TypeId) -> bool {
				true
			}
			fn handle(&self, _ctx: &MessageContext) -> HandlingResult {
				HandlingResult::Handled
			}
		}
		let subscriber = Arc::new(Sink);
		messenger
			.subscribe(SubscriberHandle::weak(&subscriber))
			.unwrap();
		drop(subscriber);

		assert_eq!(messenger.len(), 1);
		messenger.publish(Ping).unwrap();
		assert_eq!(messenger.len(), 0);
	}

	#[test]
	fn dispose_blocks_further_operations() {
		let messenger = inline_messenger();
		messenger.dispose();
		assert!(messenger.is_disposed());
		assert_eq!(messenger.publish(Ping), Err(MessengerError::Disposed));
		let subscriber = from_fn::<Ping, _>(|_msg, _ctx| HandlingResult::Handled);
		assert_eq!(
			messenger.subscribe(SubscriberHandle::Strong(subscriber)),
			Err(MessengerError::Disposed)
		);
		// A second dispose is a no-op.
		messenger.dispose();
	}

	#[test]
	fn unsubscribe_absent_reports_not_found() {
		let messenger = inline_messenger();
		let subscriber = from_fn::<Ping, _>(|_msg, _ctx| HandlingResult::Handled);
		let handle = SubscriberHandle::Strong(subscriber);
		assert_eq!(messenger.unsubscribe(handle.id()), Ok(false));
		messenger.subscribe(handle.clone()).unwrap();
		assert_eq!(messenger.unsubscribe(handle.id()), Ok(true));
		assert!(messenger.is_empty());
	}
}
