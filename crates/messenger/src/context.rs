//! The per-publish message envelope.

use std::any::{Any, TypeId};
use std::sync::Arc;

use parking_lot::Mutex;
use relay_kernel::Metadata;

/// One published message plus its dispatch context.
///
/// The context is shared by every subscriber the publish reaches, across all
/// execution modes, so the message and sender are immutable and the metadata
/// map sits behind a lock. Metadata is materialized on first write; a publish
/// that never touches it allocates nothing.
pub struct MessageContext {
	sender: Option<Arc<dyn Any + Send + Sync>>,
	message: Arc<dyn Any + Send + Sync>,
	metadata: Mutex<Option<Metadata>>,
}

impl MessageContext {
	/// Wraps a message with no sender.
	pub fn new(message: Arc<dyn Any + Send + Sync>) -> Self {
		Self {
			sender: None,
			message,
			metadata: Mutex::new(None),
		}
	}

	/// Wraps a message attributed to `sender`.
	pub fn with_sender(
		message: Arc<dyn Any + Send + Sync>,
		sender: Arc<dyn Any + Send + Sync>,
	) -> Self {
		Self {
			sender: Some(sender),
			message,
			metadata: Mutex::new(None),
		}
	}

	/// Seeds the context with metadata before dispatch.
	pub fn with_initial_metadata(self, metadata: Metadata) -> Self {
		*self.metadata.lock() = Some(metadata);
		self
	}

	/// The publisher-supplied sender, if any.
	pub fn sender(&self) -> Option<&Arc<dyn Any + Send + Sync>> {
		self.sender.as_ref()
	}

	/// The type-erased message.
	pub fn message(&self) -> &Arc<dyn Any + Send + Sync> {
		&self.message
	}

	/// The concrete type of the message.
	pub fn message_type(&self) -> TypeId {
		Any::type_id(&*self.message)
	}

	/// Downcasts the message to a concrete type.
	pub fn message_as<M: Any>(&self) -> Option<&M> {
		self.message.downcast_ref::<M>()
	}

	/// Runs `f` with the context's metadata map, creating it on first use.
	pub fn with_metadata<R>(&self, f: impl FnOnce(&mut Metadata) -> R) -> R {
		let mut slot = self.metadata.lock();
		f(slot.get_or_insert_with(Metadata::new))
	}

	/// Runs `f` with the metadata map if one was ever written.
	pub fn read_metadata<R>(&self, f: impl FnOnce(&Metadata) -> R) -> Option<R> {
		self.metadata.lock().as_ref().map(f)
	}
}

impl std::fmt::Debug for MessageContext {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("MessageContext")
			.field("message_type", &self.message_type())
			.field("has_sender", &self.sender.is_some())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use relay_kernel::MetadataKey;

	use super::*;

	struct Ping(u32);

	#[test]
	fn downcast_matches_concrete_type() {
		let ctx = MessageContext::new(Arc::new(Ping(7)));
		assert_eq!(ctx.message_type(), TypeId::of::<Ping>());
		assert_eq!(ctx.message_as::<Ping>().map(|p| p.0), Some(7));
		assert!(ctx.message_as::<String>().is_none());
	}

	#[test]
	fn metadata_materializes_on_first_write() {
		const SEEN: MetadataKey<u32> = MetadataKey::new("seen");
		let ctx = MessageContext::new(Arc::new(Ping(0)));
		assert!(ctx.read_metadata(|_| ()).is_none());
		ctx.with_metadata(|metadata| {
			metadata.insert(SEEN, 1);
		});
		assert_eq!(ctx.read_metadata(|m| m.get(SEEN).copied()), Some(Some(1)));
	}

	#[test]
	fn sender_is_carried() {
		let sender: Arc<dyn Any + Send + Sync> = Arc::new("publisher");
		let ctx = MessageContext::with_sender(Arc::new(Ping(0)), sender.clone());
		let carried = ctx.sender().map(Arc::as_ptr);
		assert_eq!(carried, Some(Arc::as_ptr(&sender)));
	}
}
