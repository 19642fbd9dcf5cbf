//! Typed publish/subscribe messenger.
//!
//! The [`Messenger`] is a component owner specialized for message dispatch:
//! subscribers register with a thread-affinity [`ExecutionMode`], publishes
//! are grouped per mode into cached dispatch bundles, and each group is
//! handed to a [`ThreadDispatcher`] that decides when and where it runs.
//!
//! Extension seams are capability components on the messenger's owner:
//! - [`SubscriberResolver`] turns a subscriber handle into registry entries
//! - [`MessengerHandler`] performs the per-subscriber dispatch
//! - [`HandlerListener`] observes each dispatch before and after
//! - [`SubscriptionListener`] observes subscribe/unsubscribe
//!
//! A dispatch outcome of [`HandlingResult::Invalid`] (a weakly-held
//! subscriber that is gone) unsubscribes the subscriber as a side effect;
//! [`HandlingResult::Ignored`] never does.
//!
//! [`ExecutionMode`]: relay_dispatch::ExecutionMode
//! [`ThreadDispatcher`]: relay_dispatch::ThreadDispatcher

mod components;
mod condition;
mod context;
mod error;
mod messenger;
pub mod subscriber;

pub use components::{
	HandlerListener, MessengerHandler, StandardHandler, StandardResolver, SubscriberResolver,
	SubscriptionListener,
};
pub use condition::{ConditionComponent, ConditionHandlerDecorator};
pub use context::MessageContext;
pub use error::MessengerError;
pub use messenger::Messenger;
pub use subscriber::{
	HandlingResult, MessageSubscriber, SubscriberEntry, SubscriberHandle, SubscriberId,
};
