//! Priority-ordered component storage and per-capability trackers.

use std::any::{Any, TypeId};
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::component::{Component, ComponentId, ErasedView};

/// A capability view paired with the identity of the providing component.
///
/// Derefs to the capability trait, so dispatch loops read like calls on the
/// capability itself. The identity is used by decorators to exclude their own
/// entry from a sibling view.
pub struct CapabilityRef<T: ?Sized> {
	id: ComponentId,
	view: Arc<T>,
}

impl<T: ?Sized> CapabilityRef<T> {
	/// Identity of the component providing this view.
	#[inline]
	pub fn id(&self) -> ComponentId {
		self.id
	}

	/// The underlying capability view.
	#[inline]
	pub fn view(&self) -> &Arc<T> {
		&self.view
	}
}

impl<T: ?Sized> Clone for CapabilityRef<T> {
	fn clone(&self) -> Self {
		Self {
			id: self.id,
			view: self.view.clone(),
		}
	}
}

impl<T: ?Sized> std::ops::Deref for CapabilityRef<T> {
	type Target = T;

	fn deref(&self) -> &T {
		&self.view
	}
}

impl<T: ?Sized> std::fmt::Debug for CapabilityRef<T> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("CapabilityRef").field("id", &self.id).finish()
	}
}

/// One stored component with its capability views captured at add time.
#[derive(Clone)]
pub(crate) struct ComponentEntry {
	pub id: ComponentId,
	pub priority: i16,
	pub component: Arc<dyn Component>,
	views: Arc<[(TypeId, ErasedView)]>,
}

impl ComponentEntry {
	pub fn new(
		id: ComponentId,
		priority: i16,
		component: Arc<dyn Component>,
		views: Arc<[(TypeId, ErasedView)]>,
	) -> Self {
		Self {
			id,
			priority,
			component,
			views,
		}
	}

	fn view_for(&self, capability: TypeId) -> Option<&ErasedView> {
		self.views
			.iter()
			.find(|(ty, _)| *ty == capability)
			.map(|(_, view)| view)
	}
}

/// Typed side of one capability tracker.
struct Tracker<T: ?Sized + Send + Sync + 'static> {
	snapshot: Arc<[CapabilityRef<T>]>,
}

impl<T: ?Sized + Send + Sync + 'static> Tracker<T> {
	fn collect(entries: &[ComponentEntry]) -> Vec<CapabilityRef<T>> {
		entries
			.iter()
			.filter_map(|entry| {
				let view = entry.view_for(TypeId::of::<T>())?;
				let view = view.downcast_ref::<Arc<T>>()?.clone();
				Some(CapabilityRef {
					id: entry.id,
					view,
				})
			})
			.collect()
	}

	fn new(entries: &[ComponentEntry]) -> Self {
		Self {
			snapshot: Self::collect(entries).into(),
		}
	}
}

/// Type-erased tracker slot, rebuilt on every collection mutation.
trait TrackerSlot: Send + Sync + 'static {
	fn rebuild(&mut self, entries: &[ComponentEntry]);
	fn as_any(&self) -> &dyn Any;
}

impl<T: ?Sized + Send + Sync + 'static> TrackerSlot for Tracker<T> {
	fn rebuild(&mut self, entries: &[ComponentEntry]) {
		let next = Self::collect(entries);
		// Keep snapshot identity when the rebuild is a no-op for this
		// capability, so unrelated mutations do not churn reader arrays.
		let unchanged = next.len() == self.snapshot.len()
			&& next.iter().zip(self.snapshot.iter()).all(|(a, b)| a.id == b.id);
		if !unchanged {
			self.snapshot = next.into();
		}
	}

	fn as_any(&self) -> &dyn Any {
		self
	}
}

/// Mutable collection state: the ordered entry list plus every tracker that
/// has been requested so far. Guarded by one mutex per owner; trackers are
/// rebuilt under that lock, so a reader never observes a tracker that is
/// inconsistent with the entry list.
#[derive(Default)]
pub(crate) struct CollectionState {
	pub entries: Vec<ComponentEntry>,
	trackers: FxHashMap<TypeId, Box<dyn TrackerSlot>>,
	pub disposed: bool,
}

impl CollectionState {
	/// Inserts an entry at the position determined by descending priority,
	/// stable among equal priorities, and refreshes all trackers.
	pub fn insert(&mut self, entry: ComponentEntry) {
		let pos = self
			.entries
			.partition_point(|existing| existing.priority >= entry.priority);
		self.entries.insert(pos, entry);
		self.rebuild_trackers();
	}

	/// Removes the entry with the given id and refreshes all trackers.
	pub fn remove(&mut self, index: usize) -> ComponentEntry {
		let entry = self.entries.remove(index);
		self.rebuild_trackers();
		entry
	}

	/// Removes every entry, refreshing trackers once. Returns the removed
	/// entries in collection order.
	pub fn drain(&mut self) -> Vec<ComponentEntry> {
		let drained = std::mem::take(&mut self.entries);
		self.rebuild_trackers();
		drained
	}

	/// Returns the snapshot for capability `T`, creating the tracker on first
	/// request.
	pub fn components<T>(&mut self) -> Arc<[CapabilityRef<T>]>
	where
		T: ?Sized + Send + Sync + 'static,
	{
		let Self {
			entries, trackers, ..
		} = self;
		let slot = trackers
			.entry(TypeId::of::<T>())
			.or_insert_with(|| Box::new(Tracker::<T>::new(entries)));
		match slot.as_any().downcast_ref::<Tracker<T>>() {
			Some(tracker) => tracker.snapshot.clone(),
			// TypeId collisions cannot occur; satisfy the type system with an
			// empty array rather than panicking in library code.
			None => Vec::new().into(),
		}
	}

	fn rebuild_trackers(&mut self) {
		let Self {
			entries, trackers, ..
		} = self;
		for slot in trackers.values_mut() {
			slot.rebuild(entries);
		}
	}
}
