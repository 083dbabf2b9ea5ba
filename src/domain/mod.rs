pub mod backoff;
pub mod errors;
pub mod event;
pub mod ports;
