//! Messenger capability traits and the standard components.
//!
//! The messenger's behavior is assembled from components on its owner. The
//! standard resolver and handler installed at construction cover the common
//! case; applications extend or override by adding higher-priority components
//! providing the same capabilities.

use std::any::TypeId;

use relay_dispatch::ExecutionMode;
use relay_kernel::{Metadata, impl_component};

use crate::context::MessageContext;
use crate::subscriber::{HandlingResult, SubscriberEntry, SubscriberHandle, SubscriberId};

/// Capability that turns a subscribe call into registry entries.
///
/// Resolvers are consulted in priority order; the first one returning a
/// non-empty set wins. Returning more than one entry registers several
/// subscribers from a single handle.
pub trait SubscriberResolver: Send + Sync + 'static {
	/// Resolves `handle` into the entries to register.
	fn resolve(&self, handle: &SubscriberHandle, mode: ExecutionMode) -> Vec<SubscriberEntry>;
}

/// Capability that performs the per-subscriber dispatch.
///
/// At publish time the messenger picks, for each entry, the first handler in
/// priority order whose [`can_handle`](Self::can_handle) accepts it; that
/// pairing is part of the cached dispatch bundle.
pub trait MessengerHandler: Send + Sync + 'static {
	/// Reports whether this handler dispatches `message_type` to `entry`.
	fn can_handle(&self, entry: &SubscriberEntry, message_type: TypeId) -> bool;

	/// Dispatches one message to one entry.
	fn handle(&self, entry: &SubscriberEntry, ctx: &MessageContext) -> HandlingResult;
}

/// Capability notified around each individual dispatch.
pub trait HandlerListener: Send + Sync + 'static {
	/// A dispatch to `entry` is about to run.
	fn on_handling(&self, entry: &SubscriberEntry, ctx: &MessageContext);

	/// A dispatch to `entry` finished with `result`.
	fn on_handled(&self, entry: &SubscriberEntry, ctx: &MessageContext, result: HandlingResult);
}

/// Capability notified when the subscriber registry changes.
pub trait SubscriptionListener: Send + Sync + 'static {
	/// An entry was registered.
	fn on_subscribed(&self, entry: &SubscriberEntry, metadata: Option<&Metadata>);

	/// An entry was removed, by request or by automatic invalidation.
	fn on_unsubscribed(&self, id: SubscriberId, metadata: Option<&Metadata>);
}

/// The default resolver: one handle, one entry.
#[derive(Debug, Default)]
pub struct StandardResolver;

impl SubscriberResolver for StandardResolver {
	fn resolve(&self, handle: &SubscriberHandle, mode: ExecutionMode) -> Vec<SubscriberEntry> {
		vec![SubscriberEntry::new(handle.clone(), mode)]
	}
}

impl_component!(StandardResolver, caps = [dyn SubscriberResolver]);

/// The default handler: resolves the handle and delegates to the subscriber.
///
/// A handle that no longer resolves is still claimed by `can_handle`; the
/// dispatch then reports [`HandlingResult::Invalid`], which is what drives
/// automatic unsubscription of dead weak subscribers.
#[derive(Debug, Default)]
pub struct StandardHandler;

impl MessengerHandler for StandardHandler {
	fn can_handle(&self, entry: &SubscriberEntry, message_type: TypeId) -> bool {
		match entry.handle().resolve() {
			Some(subscriber) => subscriber.can_handle(message_type),
			None => true,
		}
	}

	fn handle(&self, entry: &SubscriberEntry, ctx: &MessageContext) -> HandlingResult {
		match entry.handle().resolve() {
			Some(subscriber) => subscriber.handle(ctx),
			None => HandlingResult::Invalid,
		}
	}
}

impl_component!(StandardHandler, caps = [dyn MessengerHandler]);

#[cfg(test)]
mod tests {
	use std::sync::Arc;

	use super::*;
	use crate::subscriber::MessageSubscriber;

	struct OnlyPing;

	struct Ping;

	impl MessageSubscriber for OnlyPing {
		fn can_handle(&self, message_type: TypeId) -> bool {
			message_type == TypeId::of::<Ping>()
		}

		fn handle(&self, _ctx: &MessageContext) -> HandlingResult {
			HandlingResult::Handled
		}
	}

	#[test]
	fn standard_resolver_is_one_to_one() {
		let subscriber = Arc::new(OnlyPing);
		let handle = SubscriberHandle::strong(subscriber);
		let entries = StandardResolver.resolve(&handle, ExecutionMode::Main);
		assert_eq!(entries.len(), 1);
		assert_eq!(entries[0].id(), handle.id());
		assert_eq!(entries[0].mode(), ExecutionMode::Main);
	}

	#[test]
	fn standard_handler_delegates_type_filter() {
		let subscriber = Arc::new(OnlyPing);
		let entry = SubscriberEntry::new(SubscriberHandle::strong(subscriber), ExecutionMode::Inline);
		assert!(StandardHandler.can_handle(&entry, TypeId::of::<Ping>()));
		assert!(!StandardHandler.can_handle(&entry, TypeId::of::<u32>()));
	}

	#[test]
	fn dead_weak_is_claimed_and_reported_invalid() {
		let subscriber = Arc::new(OnlyPing);
		let entry = SubscriberEntry::new(SubscriberHandle::weak(&subscriber), ExecutionMode::Inline);
		drop(subscriber);

		// A dead handle is claimed for any type so the invalidation is
		// observed during dispatch rather than silently skipped.
		assert!(StandardHandler.can_handle(&entry, TypeId::of::<u32>()));
		let ctx = MessageContext::new(Arc::new(Ping));
		assert_eq!(StandardHandler.handle(&entry, &ctx), HandlingResult::Invalid);
	}
}
