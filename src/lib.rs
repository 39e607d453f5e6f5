//! Concurrent, depth-bounded web crawl scheduling.
//!
//! A [`Scheduler`](crawler::Scheduler) moves requests, responses and items
//! between elastic buffer pools and hands each one to a load-balanced
//! downloader, analyzer or pipeline instance taken from the module registrar.

pub mod cli;
pub mod crawler;
pub mod errors;
pub mod module;
pub mod storage;
pub mod utils;

pub use errors::{CrawlerError, Error, ErrorKind, Result};
