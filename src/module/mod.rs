pub mod analyzer;
pub mod base;
pub mod data;
pub mod downloader;
pub mod mid;
pub mod parsers;
pub mod pipeline;
pub mod registrar;

// Re-export common types
pub use analyzer::ParserAnalyzer;
pub use base::{
    calculate_score_simple, Analyzer, CalculateScore, Counts, Downloader, ItemProcessor, Module,
    ModuleBase, ModuleHandle, ModuleSummary, Pipeline, ResponseParser,
};
pub use data::{Data, Item, Request, Response};
pub use downloader::HttpDownloader;
pub use mid::{Mid, ModuleType, SnGenerator};
pub use pipeline::ProcessorPipeline;
pub use registrar::Registrar;
