//! Module API surface
//!
//! The shared references every entry point receives besides the kernel
//! itself: the capability registry, the state store and the event bus.

pub mod capabilities;
pub mod events;
pub mod state;
mod store;

pub use capabilities::Capabilities;
pub use events::{ErrorContext, EventBus, EventKind, KernelEvent, SubscriptionId};
pub use state::StateStore;
