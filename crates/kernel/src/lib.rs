//! Component extensibility kernel.
//!
//! This crate provides the foundational types for building extensible
//! managers out of pluggable components:
//! - [`Component`]: a pluggable object providing one or more capability views
//! - [`ComponentOwner`]: holds one priority-ordered component collection and
//!   exposes capability-filtered, cached component arrays
//! - [`CapabilityRef`]: a capability view paired with its component identity
//! - [`Siblings`]: the decorator-facing view of same-capability siblings
//! - [`Metadata`]: typed-key metadata passed through mutation surfaces
//!
//! Collections are mutated rarely and read often: mutation is serialized by
//! one mutex per owner, while reads load immutable snapshots. An array
//! obtained from [`ComponentOwner::components`] is never changed in place;
//! only a later call observes an updated collection.

mod collection;
mod component;
mod decorator;
mod error;
mod metadata;
mod owner;

pub use collection::CapabilityRef;
pub use component::{CapabilityRegistrar, Component, ComponentId, is_self};
pub use decorator::Siblings;
pub use error::KernelError;
pub use metadata::{Metadata, MetadataKey};
pub use owner::{AttachListener, ComponentOwner, WeakOwner};
