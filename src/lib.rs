//! Transactional outbox: events are appended in the same database
//! transaction as the business write that produced them, and a polling
//! dispatcher later hands each one to the handler registered for its
//! `event_type`.
//!
//! Delivery is at-least-once. Handlers must tolerate seeing an event more
//! than once.

pub mod application;
pub mod config;
pub mod db;
pub mod domain;
pub mod errors;
pub mod handlers;
pub mod infrastructure;
pub mod metrics;
pub mod schema;

use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

pub use application::{HandlerRegistry, OutboxDispatcher, OutboxProducer, TickSummary};
pub use config::DispatchConfig;
pub use db::{create_pool, DbPool};
pub use domain::errors::OutboxError;
pub use domain::event::{EventRecord, EventStatus, NewEvent, TraceContext};
pub use errors::AppError;
pub use infrastructure::{InMemoryOutboxStore, PgOutboxStore};

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Run any pending Diesel migrations against the pool's database.
pub fn run_migrations(pool: &DbPool) -> Result<(), AppError> {
    let mut conn = pool.get().map_err(OutboxError::from)?;
    conn.run_pending_migrations(MIGRATIONS)
        .map_err(|e| AppError::Migration(e.to_string()))?;
    Ok(())
}
