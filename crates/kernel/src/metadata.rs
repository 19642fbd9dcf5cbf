//! Typed-key metadata passed through mutation and dispatch surfaces.

use std::any::Any;
use std::marker::PhantomData;

use rustc_hash::FxHashMap;

/// A `const`-constructible typed key into a [`Metadata`] map.
///
/// Keys are identified by name; the type parameter fixes the value type at
/// the call site so lookups need no turbofish.
pub struct MetadataKey<T> {
	name: &'static str,
	_marker: PhantomData<fn() -> T>,
}

impl<T> MetadataKey<T> {
	/// Creates a key with the given name.
	pub const fn new(name: &'static str) -> Self {
		Self {
			name,
			_marker: PhantomData,
		}
	}

	/// Returns the key name.
	#[inline]
	pub const fn name(&self) -> &'static str {
		self.name
	}
}

impl<T> Clone for MetadataKey<T> {
	fn clone(&self) -> Self {
		*self
	}
}

impl<T> Copy for MetadataKey<T> {}

impl<T> std::fmt::Debug for MetadataKey<T> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_tuple("MetadataKey").field(&self.name).finish()
	}
}

/// Heterogeneous metadata map with typed keys.
#[derive(Default)]
pub struct Metadata {
	map: FxHashMap<&'static str, Box<dyn Any + Send + Sync>>,
}

impl Metadata {
	/// Creates an empty map.
	pub fn new() -> Self {
		Self::default()
	}

	/// Inserts a value, returning the previous value for the key if it had
	/// the same type.
	pub fn insert<T: Send + Sync + 'static>(&mut self, key: MetadataKey<T>, value: T) -> Option<T> {
		self.map
			.insert(key.name, Box::new(value))
			.and_then(|prev| prev.downcast().ok())
			.map(|prev| *prev)
	}

	/// Returns a reference to the value for `key`, if present with the
	/// expected type.
	pub fn get<T: 'static>(&self, key: MetadataKey<T>) -> Option<&T> {
		self.map.get(key.name).and_then(|value| value.downcast_ref())
	}

	/// Removes and returns the value for `key`.
	pub fn remove<T: 'static>(&mut self, key: MetadataKey<T>) -> Option<T> {
		self.map
			.remove(key.name)
			.and_then(|value| value.downcast().ok())
			.map(|value| *value)
	}

	/// Returns true if a value is stored under `key`, regardless of type.
	pub fn contains<T>(&self, key: MetadataKey<T>) -> bool {
		self.map.contains_key(key.name)
	}

	/// Number of stored values.
	#[inline]
	pub fn len(&self) -> usize {
		self.map.len()
	}

	/// Returns true if the map holds no values.
	#[inline]
	pub fn is_empty(&self) -> bool {
		self.map.is_empty()
	}
}

impl std::fmt::Debug for Metadata {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_set().entries(self.map.keys()).finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	const RETRIES: MetadataKey<u32> = MetadataKey::new("retries");
	const LABEL: MetadataKey<String> = MetadataKey::new("label");

	#[test]
	fn insert_get_remove_roundtrip() {
		let mut metadata = Metadata::new();
		assert!(metadata.is_empty());
		assert_eq!(metadata.insert(RETRIES, 3), None);
		assert_eq!(metadata.insert(RETRIES, 5), Some(3));
		assert_eq!(metadata.get(RETRIES), Some(&5));
		assert!(metadata.contains(RETRIES));
		assert_eq!(metadata.remove(RETRIES), Some(5));
		assert!(!metadata.contains(RETRIES));
	}

	#[test]
	fn keys_are_independent() {
		let mut metadata = Metadata::new();
		metadata.insert(RETRIES, 1);
		metadata.insert(LABEL, "publish".to_string());
		assert_eq!(metadata.len(), 2);
		assert_eq!(metadata.get(LABEL).map(String::as_str), Some("publish"));
		assert_eq!(metadata.get(RETRIES), Some(&1));
	}
}
