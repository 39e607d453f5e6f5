use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};
use crate::module::{Analyzer, Downloader, Pipeline};

/// Argument group validated before it is used
pub trait Args {
    fn check(&self) -> Result<()>;
}

/// Crawl boundaries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestArgs {
    /// Primary domains whose URLs may be crawled
    pub accepted_domains: Vec<String>,

    /// Deepest crawl level (the seed is level 0)
    pub max_depth: u32,
}

impl Args for RequestArgs {
    fn check(&self) -> Result<()> {
        if self.max_depth == 0 {
            return Err(Error::illegal_parameter("zero max depth"));
        }
        if self.accepted_domains.is_empty() {
            return Err(Error::illegal_parameter("empty accepted primary domain list"));
        }
        if let Some(domain) = self.accepted_domains.iter().find(|d| d.trim().is_empty()) {
            return Err(Error::illegal_parameter(format!(
                "blank accepted primary domain: {:?}",
                domain
            )));
        }
        Ok(())
    }
}

/// Buffer pool sizing, per pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataArgs {
    pub req_buffer_cap: u32,
    pub req_max_buffer_number: u32,
    pub resp_buffer_cap: u32,
    pub resp_max_buffer_number: u32,
    pub item_buffer_cap: u32,
    pub item_max_buffer_number: u32,
    pub error_buffer_cap: u32,
    pub error_max_buffer_number: u32,
}

impl Default for DataArgs {
    fn default() -> Self {
        Self {
            req_buffer_cap: 50,
            req_max_buffer_number: 1000,
            resp_buffer_cap: 50,
            resp_max_buffer_number: 1000,
            item_buffer_cap: 50,
            item_max_buffer_number: 1000,
            error_buffer_cap: 50,
            error_max_buffer_number: 1,
        }
    }
}

impl Args for DataArgs {
    fn check(&self) -> Result<()> {
        let fields = [
            ("request buffer capacity", self.req_buffer_cap),
            ("request max buffer number", self.req_max_buffer_number),
            ("response buffer capacity", self.resp_buffer_cap),
            ("response max buffer number", self.resp_max_buffer_number),
            ("item buffer capacity", self.item_buffer_cap),
            ("item max buffer number", self.item_max_buffer_number),
            ("error buffer capacity", self.error_buffer_cap),
            ("error max buffer number", self.error_max_buffer_number),
        ];
        match fields.iter().find(|(_, value)| *value == 0) {
            Some((name, _)) => Err(Error::illegal_parameter(format!("zero {}", name))),
            None => Ok(()),
        }
    }
}

/// Module instances to register
#[derive(Clone, Default)]
pub struct ModuleArgs {
    pub downloaders: Vec<Arc<dyn Downloader>>,
    pub analyzers: Vec<Arc<dyn Analyzer>>,
    pub pipelines: Vec<Arc<dyn Pipeline>>,
}

impl ModuleArgs {
    pub fn summary(&self) -> ModuleArgsSummary {
        ModuleArgsSummary {
            downloader_list_size: self.downloaders.len(),
            analyzer_list_size: self.analyzers.len(),
            pipeline_list_size: self.pipelines.len(),
        }
    }
}

impl Args for ModuleArgs {
    fn check(&self) -> Result<()> {
        if self.downloaders.is_empty() {
            return Err(Error::illegal_parameter("empty downloader list"));
        }
        if self.analyzers.is_empty() {
            return Err(Error::illegal_parameter("empty analyzer list"));
        }
        if self.pipelines.is_empty() {
            return Err(Error::illegal_parameter("empty pipeline list"));
        }
        Ok(())
    }
}

impl std::fmt::Debug for ModuleArgs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.summary().fmt(f)
    }
}

/// Sizes of the module lists handed to the scheduler
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleArgsSummary {
    pub downloader_list_size: usize,
    pub analyzer_list_size: usize,
    pub pipeline_list_size: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_args_check() {
        let mut args = RequestArgs {
            accepted_domains: vec!["example.com".to_string()],
            max_depth: 2,
        };
        assert!(args.check().is_ok());

        args.max_depth = 0;
        assert!(matches!(args.check(), Err(Error::IllegalParameter(_))));

        args.max_depth = 1;
        args.accepted_domains.clear();
        assert!(matches!(args.check(), Err(Error::IllegalParameter(_))));

        args.accepted_domains.push("  ".to_string());
        assert!(args.check().is_err());
    }

    #[test]
    fn test_data_args_check() {
        assert!(DataArgs::default().check().is_ok());

        let args = DataArgs {
            item_buffer_cap: 0,
            ..DataArgs::default()
        };
        assert_eq!(
            args.check(),
            Err(Error::illegal_parameter("zero item buffer capacity"))
        );
    }

    #[test]
    fn test_empty_module_args() {
        let args = ModuleArgs::default();
        assert_eq!(
            args.check(),
            Err(Error::illegal_parameter("empty downloader list"))
        );
        assert_eq!(args.summary(), ModuleArgsSummary::default());
    }
}
