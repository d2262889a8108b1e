mod memory;
mod mongo;
mod store;

pub use memory::MemoryStore;
pub use mongo::MongoDB;
pub use store::{Store, StoreError};
