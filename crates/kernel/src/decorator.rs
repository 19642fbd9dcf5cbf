//! Sibling views for decorator components.
//!
//! A decorator is a component that implements a capability and wraps the
//! sibling components of that same capability. To avoid recursing into
//! itself, a decorator is given an explicit [`Siblings`] view constructed
//! from the [`ComponentId`] it received in its attach notification, rather
//! than filtering by reference equality at every call site.

use std::marker::PhantomData;

use crate::collection::CapabilityRef;
use crate::component::ComponentId;
use crate::owner::{ComponentOwner, WeakOwner};

/// View of the capability `T` components in an owner, excluding one
/// component (the decorator holding the view).
///
/// The view holds the owner weakly so a decorator stored inside the owner's
/// own collection does not keep it alive. Each call to [`get`](Self::get)
/// reads the owner's current tracker snapshot, so decorators observe
/// siblings added or removed after construction.
pub struct Siblings<T: ?Sized> {
	owner: WeakOwner,
	skip: ComponentId,
	_marker: PhantomData<fn() -> CapabilityRef<T>>,
}

impl<T: ?Sized + Send + Sync + 'static> Siblings<T> {
	/// Creates a view over `owner` excluding the component with id `skip`.
	pub fn new(owner: &ComponentOwner, skip: ComponentId) -> Self {
		Self {
			owner: owner.downgrade(),
			skip,
			_marker: PhantomData,
		}
	}

	/// The excluded component id.
	#[inline]
	pub fn skip(&self) -> ComponentId {
		self.skip
	}

	/// Upgrades the owner handle, if the owner is still alive.
	pub fn owner(&self) -> Option<ComponentOwner> {
		self.owner.upgrade()
	}

	/// Returns the current siblings in collection (priority) order. Empty
	/// when the owner has been dropped.
	pub fn get(&self) -> Vec<CapabilityRef<T>> {
		let Some(owner) = self.owner.upgrade() else {
			return Vec::new();
		};
		owner
			.components::<T>()
			.iter()
			.filter(|component| component.id() != self.skip)
			.cloned()
			.collect()
	}
}

impl<T: ?Sized> std::fmt::Debug for Siblings<T> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Siblings").field("skip", &self.skip).finish()
	}
}
