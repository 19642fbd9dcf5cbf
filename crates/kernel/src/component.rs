//! Component trait, identity, and capability registration.

use std::any::{Any, TypeId};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-unique identifier assigned to a component when it is added to a
/// collection. Re-adding a removed component yields a fresh id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ComponentId(u64);

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

impl ComponentId {
	pub(crate) fn next() -> Self {
		Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
	}

	/// Returns the underlying u64 value.
	#[inline]
	pub fn as_u64(self) -> u64 {
		self.0
	}
}

impl std::fmt::Display for ComponentId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "ComponentId({})", self.0)
	}
}

/// Type-erased capability view: an `Arc<dyn Cap>` boxed behind `dyn Any`.
pub(crate) type ErasedView = Arc<dyn Any + Send + Sync>;

/// Collects the capability views a component provides.
///
/// A component calls [`CapabilityRegistrar::provide`] once per capability
/// trait it implements; the owner indexes the views by capability `TypeId`
/// so that dispatch loops iterate plain typed arrays.
#[derive(Default)]
pub struct CapabilityRegistrar {
	views: Vec<(TypeId, ErasedView)>,
}

impl CapabilityRegistrar {
	/// Records one capability view for the component being added.
	pub fn provide<T>(&mut self, view: Arc<T>)
	where
		T: ?Sized + Send + Sync + 'static,
	{
		self.views.push((TypeId::of::<T>(), Arc::new(view)));
	}

	/// Returns the number of views provided so far.
	#[inline]
	pub fn len(&self) -> usize {
		self.views.len()
	}

	/// Returns true if no views were provided.
	#[inline]
	pub fn is_empty(&self) -> bool {
		self.views.is_empty()
	}

	pub(crate) fn into_views(self) -> Arc<[(TypeId, ErasedView)]> {
		self.views.into()
	}
}

/// A pluggable object registered into a component collection.
///
/// Identity is reference equality of the component allocation: a component
/// belongs to at most one collection at a time and may be re-added elsewhere
/// only after removal.
pub trait Component: Any + Send + Sync {
	/// Ordering priority; higher priorities run earlier. Ties are stable in
	/// insertion order.
	fn priority(&self) -> i16 {
		0
	}

	/// Provides the capability views this component implements.
	///
	/// The registrar is called once, when the component is added. A component
	/// providing no views still participates in the collection (and in
	/// [`ComponentOwner::items`](crate::ComponentOwner::items)) but never
	/// appears in a capability array.
	fn capabilities(self: Arc<Self>, registrar: &mut CapabilityRegistrar) {
		let _ = registrar;
	}
}

/// Returns true when `component` is the same allocation as `me`.
///
/// Used by components observing attach notifications to recognize their own
/// registration, e.g. to capture the [`ComponentId`] a decorator needs for
/// its sibling view.
pub fn is_self<C: Component>(me: &C, component: &Arc<dyn Component>) -> bool {
	std::ptr::eq(Arc::as_ptr(component) as *const (), (me as *const C).cast())
}

pub(crate) fn same_component(a: &Arc<dyn Component>, b: &Arc<dyn Component>) -> bool {
	std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

/// Implements [`Component`] for a type with a fixed priority and a fixed
/// capability list.
///
/// ```
/// use relay_kernel::impl_component;
///
/// trait Greeter: Send + Sync + 'static {
/// 	fn greet(&self) -> &'static str;
/// }
///
/// struct Hello;
///
/// impl Greeter for Hello {
/// 	fn greet(&self) -> &'static str {
/// 		"hello"
/// 	}
/// }
///
/// impl_component!(Hello, priority = 10, caps = [dyn Greeter]);
/// ```
#[macro_export]
macro_rules! impl_component {
	($ty:ty) => {
		$crate::impl_component!($ty, priority = 0, caps = []);
	};
	($ty:ty, caps = [$($cap:ty),* $(,)?]) => {
		$crate::impl_component!($ty, priority = 0, caps = [$($cap),*]);
	};
	($ty:ty, priority = $priority:expr, caps = [$($cap:ty),* $(,)?]) => {
		impl $crate::Component for $ty {
			fn priority(&self) -> i16 {
				$priority
			}

			fn capabilities(self: ::std::sync::Arc<Self>, registrar: &mut $crate::CapabilityRegistrar) {
				$(
					let view: ::std::sync::Arc<$cap> = self.clone();
					registrar.provide::<$cap>(view);
				)*
				let _ = (self, registrar);
			}
		}
	};
}

#[cfg(test)]
mod tests {
	use super::*;

	trait Probe: Send + Sync + 'static {
		fn value(&self) -> i32;
	}

	struct Fixed(i32);

	impl Probe for Fixed {
		fn value(&self) -> i32 {
			self.0
		}
	}

	impl_component!(Fixed, priority = 7, caps = [dyn Probe]);

	struct Bare;

	impl_component!(Bare);

	#[test]
	fn macro_implements_priority_and_caps() {
		let c = Arc::new(Fixed(3));
		assert_eq!(c.priority(), 7);

		let mut registrar = CapabilityRegistrar::default();
		c.capabilities(&mut registrar);
		assert_eq!(registrar.len(), 1);

		let views = registrar.into_views();
		let (ty, view) = &views[0];
		assert_eq!(*ty, TypeId::of::<dyn Probe>());
		let probe = view
			.downcast_ref::<Arc<dyn Probe>>()
			.map(|p| p.value());
		assert_eq!(probe, Some(3));
	}

	#[test]
	fn bare_component_has_no_caps() {
		let c = Arc::new(Bare);
		assert_eq!(c.priority(), 0);
		let mut registrar = CapabilityRegistrar::default();
		c.capabilities(&mut registrar);
		assert!(registrar.is_empty());
	}

	#[test]
	fn ids_are_unique() {
		let a = ComponentId::next();
		let b = ComponentId::next();
		assert_ne!(a, b);
		assert!(b.as_u64() > a.as_u64());
	}

	#[test]
	fn is_self_matches_own_allocation() {
		let a: Arc<Fixed> = Arc::new(Fixed(1));
		let b: Arc<Fixed> = Arc::new(Fixed(1));
		let a_dyn: Arc<dyn Component> = a.clone();
		assert!(is_self(&*a, &a_dyn));
		assert!(!is_self(&*b, &a_dyn));
	}
}
