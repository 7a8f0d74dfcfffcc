pub mod eval;
pub mod manager;
pub mod memory;
pub mod postgres;
pub mod store;

pub use manager::{DatabaseManager, MOVIES_COLLECTION};
pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use store::{DocumentStore, StoreError};
