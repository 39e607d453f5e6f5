pub mod buffer;
pub mod pool;
pub mod sink;

// Re-export common types
pub use buffer::{Buffer, PutOutcome};
pub use pool::Pool;
pub use sink::JsonLinesSink;
