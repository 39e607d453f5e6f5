use serde::Serialize;

use crate::crawler::args::{DataArgs, ModuleArgsSummary, RequestArgs};
use crate::crawler::status::Status;
use crate::module::{ModuleSummary, ModuleType, Registrar};
use crate::storage::Pool;

/// Occupancy of one buffer pool
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PoolSummary {
    pub buffer_cap: u32,
    pub max_buffer_number: u32,
    pub buffer_number: u32,
    pub total: u64,
}

impl PoolSummary {
    pub fn of<T>(pool: &Pool<T>) -> Self {
        Self {
            buffer_cap: pool.buffer_cap(),
            max_buffer_number: pool.max_buffer_number(),
            buffer_number: pool.buffer_number(),
            total: pool.total(),
        }
    }
}

/// Registered modules, by category, sorted by ID
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ModulesSummary {
    pub downloaders: Vec<ModuleSummary>,
    pub analyzers: Vec<ModuleSummary>,
    pub pipelines: Vec<ModuleSummary>,
}

impl ModulesSummary {
    pub fn of(registrar: &Registrar) -> Self {
        let collect = |module_type: ModuleType| {
            let mut summaries: Vec<ModuleSummary> = registrar
                .get_all_by_type(module_type)
                .map(|modules| modules.values().map(|m| m.base().summary()).collect())
                .unwrap_or_default();
            summaries.sort_by(|a, b| a.id.as_str().cmp(b.id.as_str()));
            summaries
        };

        Self {
            downloaders: collect(ModuleType::Downloader),
            analyzers: collect(ModuleType::Analyzer),
            pipelines: collect(ModuleType::Pipeline),
        }
    }
}

/// Point-in-time view of a scheduler
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SchedSummary {
    pub status: Status,
    pub request_args: Option<RequestArgs>,
    pub data_args: Option<DataArgs>,
    pub module_args: Option<ModuleArgsSummary>,
    pub modules: ModulesSummary,
    pub request_pool: PoolSummary,
    pub response_pool: PoolSummary,
    pub item_pool: PoolSummary,
    pub error_pool: PoolSummary,
    /// Distinct URLs admitted into the request pool
    pub num_urls: usize,
}

impl SchedSummary {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pool_summary() {
        let pool: Pool<u32> = Pool::new(4, 2).unwrap();
        pool.put(1).await.unwrap();

        let summary = PoolSummary::of(&pool);
        assert_eq!(
            summary,
            PoolSummary {
                buffer_cap: 4,
                max_buffer_number: 2,
                buffer_number: 1,
                total: 1,
            }
        );
    }

    #[test]
    fn test_summary_json() {
        let summary = SchedSummary::default();
        let json = summary.to_json().unwrap();
        assert!(json.contains("\"status\": \"uninitialized\""));
        assert!(json.contains("\"num_urls\": 0"));
    }
}
