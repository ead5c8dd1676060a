//! Subscriptions and the event registry they feed.

pub mod registry;
pub mod subscription;

pub use registry::{Callback, Delivery, EventRegistry, Listener, Notification};
pub use subscription::{Subscription, SubscriptionHandle};
