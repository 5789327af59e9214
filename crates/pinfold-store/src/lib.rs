//! pinfold-store — durable agent state backed by sled.

mod store;

pub use store::{StateStore, TrackedPinUpdate};
