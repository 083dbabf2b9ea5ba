pub mod in_memory;
pub mod models;
pub mod outbox_repo;

pub use in_memory::InMemoryOutboxStore;
pub use outbox_repo::PgOutboxStore;
