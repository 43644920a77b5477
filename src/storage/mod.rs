pub mod engine;
pub mod memory;
pub mod subscription;

pub use engine::EntityStore;
pub use memory::InMemoryEntityStore;
pub use subscription::{EntityEvent, Listener, SubscriberRegistry, Subscription};
