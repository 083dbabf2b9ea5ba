pub mod dispatcher;
pub mod producer;
pub mod registry;
pub mod runner;

pub use dispatcher::{DispatchOutcome, OutboxDispatcher, TickSummary};
pub use producer::OutboxProducer;
pub use registry::HandlerRegistry;
