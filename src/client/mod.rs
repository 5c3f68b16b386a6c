// Client module - game API surface, request hooks and retried reads
pub mod api;
pub mod hooks;
pub mod oracle;

pub use api::{GameApi, HttpGameApi};
pub use oracle::{ResourceOracle, RetryPolicy};
