pub mod logging;

// Re-export common functions
pub use logging::{default_log_file, init_logging};
