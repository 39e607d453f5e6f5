pub mod args;
pub mod controller;
pub mod filter;
pub mod scheduler;
pub mod status;
pub mod summary;

// Re-export common types
pub use args::{Args, DataArgs, ModuleArgs, ModuleArgsSummary, RequestArgs};
pub use controller::{CrawlReport, CrawlerController};
pub use filter::{normalize_url, primary_domain, Admission, RequestFilter};
pub use scheduler::Scheduler;
pub use status::{check_status, Status, StatusError};
pub use summary::{ModulesSummary, PoolSummary, SchedSummary};
