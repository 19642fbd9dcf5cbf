//! Conditional delivery as a handler decorator.
//!
//! [`ConditionHandlerDecorator`] wraps the other [`MessengerHandler`]
//! components of the same messenger. Before delegating a dispatch it asks
//! every [`ConditionComponent`] on the owner whether delivery is allowed; if
//! any condition blocks, the dispatch reports [`HandlingResult::Ignored`] and
//! the wrapped handlers never run. With no conditions registered the
//! decorator is transparent.

use std::any::TypeId;
use std::sync::{Arc, OnceLock};

use relay_kernel::{
	AttachListener, CapabilityRegistrar, Component, ComponentId, ComponentOwner, Metadata,
	Siblings, is_self,
};

use crate::components::MessengerHandler;
use crate::context::MessageContext;
use crate::subscriber::{HandlingResult, SubscriberEntry};

/// Capability that gates message delivery per subscriber.
pub trait ConditionComponent: Send + Sync + 'static {
	/// Returns true when `entry` may receive the message in `ctx`.
	fn can_handle(&self, entry: &SubscriberEntry, ctx: &MessageContext) -> bool;
}

/// Handler decorator enforcing [`ConditionComponent`] gates.
///
/// Registers at a priority above the standard handler so dispatch bundles
/// pair entries with the decorator, which then delegates to its siblings.
/// The sibling view is captured from the decorator's own attach
/// notification; until it is attached the decorator claims nothing.
#[derive(Default)]
pub struct ConditionHandlerDecorator {
	siblings: OnceLock<Siblings<dyn MessengerHandler>>,
}

impl ConditionHandlerDecorator {
	/// Priority of the decorator within the owner's collection.
	pub const PRIORITY: i16 = 100;

	/// Creates a decorator; the sibling view attaches when the component is
	/// added to an owner.
	pub fn new() -> Self {
		Self::default()
	}

	fn allowed(&self, entry: &SubscriberEntry, ctx: &MessageContext) -> bool {
		let Some(owner) = self.siblings.get().and_then(Siblings::owner) else {
			return true;
		};
		owner
			.components::<dyn ConditionComponent>()
			.iter()
			.all(|condition| condition.can_handle(entry, ctx))
	}
}

impl MessengerHandler for ConditionHandlerDecorator {
	fn can_handle(&self, entry: &SubscriberEntry, message_type: TypeId) -> bool {
		let Some(siblings) = self.siblings.get() else {
			return false;
		};
		siblings
			.get()
			.iter()
			.any(|handler| handler.can_handle(entry, message_type))
	}

	fn handle(&self, entry: &SubscriberEntry, ctx: &MessageContext) -> HandlingResult {
		if !self.allowed(entry, ctx) {
			return HandlingResult::Ignored;
		}
		let Some(siblings) = self.siblings.get() else {
			return HandlingResult::Ignored;
		};
		let message_type = ctx.message_type();
		for handler in siblings.get() {
			if handler.can_handle(entry, message_type) {
				return handler.handle(entry, ctx);
			}
		}
		HandlingResult::Ignored
	}
}

impl AttachListener for ConditionHandlerDecorator {
	fn on_attached(
		&self,
		owner: &ComponentOwner,
		id: ComponentId,
		component: &Arc<dyn Component>,
		_metadata: Option<&Metadata>,
	) {
		if is_self(self, component) {
			let _ = self.siblings.set(Siblings::new(owner, id));
		}
	}

	fn on_detached(
		&self,
		_owner: &ComponentOwner,
		_id: ComponentId,
		_component: &Arc<dyn Component>,
		_metadata: Option<&Metadata>,
	) {
	}
}

impl Component for ConditionHandlerDecorator {
	fn priority(&self) -> i16 {
		Self::PRIORITY
	}

	fn capabilities(self: Arc<Self>, registrar: &mut CapabilityRegistrar) {
		let handler: Arc<dyn MessengerHandler> = self.clone();
		registrar.provide::<dyn MessengerHandler>(handler);
		let listener: Arc<dyn AttachListener> = self;
		registrar.provide::<dyn AttachListener>(listener);
	}
}

impl std::fmt::Debug for ConditionHandlerDecorator {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ConditionHandlerDecorator")
			.field("attached", &self.siblings.get().is_some())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use relay_dispatch::ExecutionMode;
	use relay_kernel::impl_component;

	use super::*;
	use crate::components::StandardHandler;
	use crate::subscriber::{MessageSubscriber, SubscriberHandle};

	struct Ping;

	struct AlwaysHandled;

	impl MessageSubscriber for AlwaysHandled {
		fn can_handle(&self, _message_type: TypeId) -> bool {
			true
		}

		fn handle(&self, _ctx: &MessageContext) -> HandlingResult {
			HandlingResult::Handled
		}
	}

	struct BlockAll;

	impl ConditionComponent for BlockAll {
		fn can_handle(&self, _entry: &SubscriberEntry, _ctx: &MessageContext) -> bool {
			false
		}
	}

	impl_component!(BlockAll, caps = [dyn ConditionComponent]);

	fn decorated_owner() -> (ComponentOwner, Arc<ConditionHandlerDecorator>) {
		let owner = ComponentOwner::new();
		let decorator = Arc::new(ConditionHandlerDecorator::new());
		owner.add(decorator.clone()).unwrap();
		owner.add(Arc::new(StandardHandler)).unwrap();
		(owner, decorator)
	}

	fn sample_entry() -> SubscriberEntry {
		SubscriberEntry::new(
			SubscriberHandle::strong(Arc::new(AlwaysHandled)),
			ExecutionMode::Inline,
		)
	}

	#[test]
	fn transparent_without_conditions() {
		let (_owner, decorator) = decorated_owner();
		let entry = sample_entry();
		let ctx = MessageContext::new(Arc::new(Ping));
		assert!(decorator.can_handle(&entry, TypeId::of::<Ping>()));
		assert_eq!(decorator.handle(&entry, &ctx), HandlingResult::Handled);
	}

	#[test]
	fn blocking_condition_yields_ignored() {
		let (owner, decorator) = decorated_owner();
		owner.add(Arc::new(BlockAll)).unwrap();
		let entry = sample_entry();
		let ctx = MessageContext::new(Arc::new(Ping));
		// Still claimed (siblings would handle it), but delivery is gated.
		assert!(decorator.can_handle(&entry, TypeId::of::<Ping>()));
		assert_eq!(decorator.handle(&entry, &ctx), HandlingResult::Ignored);
	}

	#[test]
	fn unattached_decorator_claims_nothing() {
		let decorator = ConditionHandlerDecorator::new();
		let entry = sample_entry();
		assert!(!decorator.can_handle(&entry, TypeId::of::<Ping>()));
	}
}
