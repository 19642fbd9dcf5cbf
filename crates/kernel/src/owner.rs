//! The owner contract: one component collection, capability-filtered arrays,
//! and attach/detach notification.

use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use tracing::trace;

use crate::collection::{CapabilityRef, CollectionState, ComponentEntry};
use crate::component::{CapabilityRegistrar, Component, ComponentId, same_component};
use crate::error::KernelError;
use crate::metadata::Metadata;

/// Capability for components that observe collection mutation.
///
/// Callbacks run synchronously before the mutating call returns, after the
/// owner's internal locks are released, so a listener may re-enter the owner
/// (including mutating it). The component being added receives its own
/// attach notification; decorators use that to capture their [`ComponentId`].
pub trait AttachListener: Send + Sync + 'static {
	/// A component was added to the owner's collection.
	fn on_attached(
		&self,
		owner: &ComponentOwner,
		id: ComponentId,
		component: &Arc<dyn Component>,
		metadata: Option<&Metadata>,
	);

	/// A component was removed from the owner's collection.
	fn on_detached(
		&self,
		owner: &ComponentOwner,
		id: ComponentId,
		component: &Arc<dyn Component>,
		metadata: Option<&Metadata>,
	);
}

struct OwnerInner {
	state: Mutex<CollectionState>,
	items: ArcSwap<Vec<Arc<dyn Component>>>,
}

/// An extensible manager's component store.
///
/// Holds exactly one priority-ordered component collection and a lazily
/// populated tracker per capability type. Cloning the owner clones a handle
/// to the same collection.
#[derive(Clone)]
pub struct ComponentOwner {
	inner: Arc<OwnerInner>,
}

/// Non-owning handle to a [`ComponentOwner`], for components that must refer
/// back to their owner without keeping it alive.
#[derive(Clone)]
pub struct WeakOwner {
	inner: std::sync::Weak<OwnerInner>,
}

impl WeakOwner {
	/// Upgrades to a strong owner handle if the owner is still alive.
	pub fn upgrade(&self) -> Option<ComponentOwner> {
		self.inner.upgrade().map(|inner| ComponentOwner { inner })
	}
}

impl Default for ComponentOwner {
	fn default() -> Self {
		Self::new()
	}
}

impl ComponentOwner {
	/// Creates an owner with an empty collection.
	pub fn new() -> Self {
		Self {
			inner: Arc::new(OwnerInner {
				state: Mutex::new(CollectionState::default()),
				items: ArcSwap::from_pointee(Vec::new()),
			}),
		}
	}

	/// Returns a non-owning handle to this owner.
	pub fn downgrade(&self) -> WeakOwner {
		WeakOwner {
			inner: Arc::downgrade(&self.inner),
		}
	}

	/// Adds a component at the position determined by its priority.
	///
	/// Idempotent: re-adding the same allocation returns `Ok(false)` without
	/// mutation or notification.
	pub fn add(&self, component: Arc<dyn Component>) -> Result<bool, KernelError> {
		self.add_with(component, None)
	}

	/// [`add`](Self::add) with caller metadata forwarded to attach listeners.
	pub fn add_with(
		&self,
		component: Arc<dyn Component>,
		metadata: Option<&Metadata>,
	) -> Result<bool, KernelError> {
		let id = {
			let mut state = self.inner.state.lock();
			if state.disposed {
				return Err(KernelError::Disposed);
			}
			if state
				.entries
				.iter()
				.any(|entry| same_component(&entry.component, &component))
			{
				return Ok(false);
			}
			let priority = component.priority();
			let mut registrar = CapabilityRegistrar::default();
			component.clone().capabilities(&mut registrar);
			let id = ComponentId::next();
			state.insert(ComponentEntry::new(
				id,
				priority,
				component.clone(),
				registrar.into_views(),
			));
			self.store_items(&state);
			id
		};
		trace!(component = id.as_u64(), "kernel.component.attach");
		self.notify_attached(id, &component, metadata);
		Ok(true)
	}

	/// Removes the first reference-equal match; returns `Ok(false)` when the
	/// component is not present.
	pub fn remove(&self, component: &Arc<dyn Component>) -> Result<bool, KernelError> {
		self.remove_with(component, None)
	}

	/// [`remove`](Self::remove) with caller metadata forwarded to attach
	/// listeners.
	pub fn remove_with(
		&self,
		component: &Arc<dyn Component>,
		metadata: Option<&Metadata>,
	) -> Result<bool, KernelError> {
		// Capture listeners before mutation so the removed component, if it
		// listens, still observes its own detach.
		let listeners = self.components::<dyn AttachListener>();
		let removed = {
			let mut state = self.inner.state.lock();
			if state.disposed {
				return Err(KernelError::Disposed);
			}
			let Some(index) = state
				.entries
				.iter()
				.position(|entry| same_component(&entry.component, component))
			else {
				return Ok(false);
			};
			let removed = state.remove(index);
			self.store_items(&state);
			removed
		};
		trace!(component = removed.id.as_u64(), "kernel.component.detach");
		for listener in listeners.iter() {
			listener.on_detached(self, removed.id, &removed.component, metadata);
		}
		Ok(true)
	}

	/// Returns the cached array of capability `T` views, in collection
	/// (priority) order. O(1) after the first request for `T`; the returned
	/// array is an immutable snapshot.
	pub fn components<T>(&self) -> Arc<[CapabilityRef<T>]>
	where
		T: ?Sized + Send + Sync + 'static,
	{
		self.inner.state.lock().components::<T>()
	}

	/// Returns the current ordered component snapshot.
	pub fn items(&self) -> Arc<Vec<Arc<dyn Component>>> {
		self.inner.items.load_full()
	}

	/// Number of components in the collection.
	pub fn len(&self) -> usize {
		self.inner.items.load().len()
	}

	/// Returns true when the collection holds no components.
	pub fn is_empty(&self) -> bool {
		self.inner.items.load().is_empty()
	}

	/// Returns true once [`dispose`](Self::dispose) has run.
	pub fn is_disposed(&self) -> bool {
		self.inner.state.lock().disposed
	}

	/// Removes all components (notifying detach listeners in collection
	/// order) and marks the owner disposed. Later `add`/`remove` calls fail
	/// with [`KernelError::Disposed`]. Idempotent.
	pub fn dispose(&self) {
		// Capture listeners before draining so detach notifications still
		// reach components removed by the dispose itself.
		let listeners = self.components::<dyn AttachListener>();
		let drained = {
			let mut state = self.inner.state.lock();
			if state.disposed {
				return;
			}
			state.disposed = true;
			let drained = state.drain();
			self.store_items(&state);
			drained
		};
		trace!(components = drained.len(), "kernel.owner.dispose");
		for entry in &drained {
			for listener in listeners.iter() {
				listener.on_detached(self, entry.id, &entry.component, None);
			}
		}
	}

	fn store_items(&self, state: &CollectionState) {
		let items: Vec<Arc<dyn Component>> = state
			.entries
			.iter()
			.map(|entry| entry.component.clone())
			.collect();
		self.inner.items.store(Arc::new(items));
	}

	fn notify_attached(
		&self,
		id: ComponentId,
		component: &Arc<dyn Component>,
		metadata: Option<&Metadata>,
	) {
		for listener in self.components::<dyn AttachListener>().iter() {
			listener.on_attached(self, id, component, metadata);
		}
	}

}

impl std::fmt::Debug for ComponentOwner {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ComponentOwner")
			.field("len", &self.len())
			.field("disposed", &self.is_disposed())
			.finish()
	}
}
