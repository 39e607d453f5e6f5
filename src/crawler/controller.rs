use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::mpsc::Receiver;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::cli::config::CrawlerConfig;
use crate::crawler::args::ModuleArgs;
use crate::crawler::filter::primary_domain;
use crate::crawler::scheduler::Scheduler;
use crate::crawler::summary::SchedSummary;
use crate::errors::CrawlerError;
use crate::module::{
    parsers, Analyzer, Downloader, HttpDownloader, Item, ItemProcessor, Mid, ModuleType,
    ParserAnalyzer, Pipeline, ProcessorPipeline, Request, SnGenerator,
};
use crate::storage::JsonLinesSink;

/// Outcome of one crawl run
#[derive(Debug, Clone)]
pub struct CrawlReport {
    /// Identifier of this run, used in logs
    pub run_id: Uuid,

    /// Scheduler state right after it was stopped
    pub summary: SchedSummary,

    /// Crawl-time errors observed while monitoring
    pub errors: Vec<CrawlerError>,

    /// Items written to the output file
    pub items_written: u64,

    pub output: PathBuf,
}

/// Runs a crawl with the stock modules: builds them from configuration,
/// starts the scheduler and stops it once the crawl runs dry.
pub struct CrawlerController {
    config: CrawlerConfig,
    scheduler: Arc<Scheduler>,
    sink: Arc<JsonLinesSink>,
    sn: SnGenerator,
    run_id: Uuid,
}

impl CrawlerController {
    /// Create a new crawler controller with the given configuration
    pub fn new(config: CrawlerConfig) -> Result<Self> {
        let sink = JsonLinesSink::create(&config.output.items_file)
            .context("Failed to open the item output")?;
        let sn = SnGenerator::new(config.modules.sn_start, config.modules.sn_max);

        Ok(Self {
            config,
            scheduler: Arc::new(Scheduler::new()),
            sink: Arc::new(sink),
            sn,
            run_id: Uuid::new_v4(),
        })
    }

    pub fn scheduler(&self) -> &Arc<Scheduler> {
        &self.scheduler
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Crawl from `url` until the scheduler has been idle for the configured
    /// number of consecutive checks.
    pub async fn run(&self, url: &str) -> Result<CrawlReport> {
        let seed = Request::parse(url, 0).context(format!("Invalid start URL: {}", url))?;
        info!(run_id = %self.run_id, "Starting crawl of {}", seed.url);

        let mut request_args = self.config.request.clone();
        if request_args.accepted_domains.is_empty() {
            let host = seed
                .host()
                .context(format!("Start URL has no host: {}", seed.url))?;
            request_args.accepted_domains.push(primary_domain(host)?);
        }

        let module_args = self.build_modules()?;
        self.scheduler
            .init(request_args, self.config.data, module_args)
            .context("Failed to initialize the scheduler")?;
        self.scheduler
            .start(seed)
            .context("Failed to start the scheduler")?;

        let mut error_rx = self
            .scheduler
            .error_chan()
            .context("Scheduler is not running")?;
        let mut errors = self.monitor(&mut error_rx).await;

        self.scheduler.stop().context("Failed to stop the scheduler")?;
        loop {
            match error_rx.try_recv() {
                Ok(e) => {
                    warn!(run_id = %self.run_id, "{}", e);
                    errors.push(e);
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        self.sink.flush()?;

        let summary = self.scheduler.summary();
        let report = CrawlReport {
            run_id: self.run_id,
            summary,
            errors,
            items_written: self.sink.written(),
            output: self.sink.path().to_path_buf(),
        };
        info!(
            run_id = %self.run_id,
            urls = report.summary.num_urls,
            items = report.items_written,
            errors = report.errors.len(),
            "Crawl finished"
        );
        Ok(report)
    }

    /// Watch the scheduler until it has been idle long enough, logging
    /// errors as they arrive.
    async fn monitor(&self, error_rx: &mut Receiver<CrawlerError>) -> Vec<CrawlerError> {
        let settings = &self.config.monitor;
        let mut ticker = tokio::time::interval(settings.check_interval());
        let mut idle_count = 0u32;
        let mut errors = Vec::new();
        let mut last_summary: Option<SchedSummary> = None;
        let mut error_rx_open = true;

        loop {
            tokio::select! {
                received = error_rx.recv(), if error_rx_open => match received {
                    Some(e) => {
                        warn!(run_id = %self.run_id, "{}", e);
                        errors.push(e);
                    }
                    None => error_rx_open = false,
                },
                _ = ticker.tick() => {
                    if settings.log_summary {
                        let summary = self.scheduler.summary();
                        if last_summary.as_ref() != Some(&summary) {
                            debug!(run_id = %self.run_id, "Scheduler summary: {}", summary.to_json().unwrap_or_default());
                            last_summary = Some(summary);
                        }
                    }

                    if self.scheduler.idle() {
                        idle_count += 1;
                        if idle_count >= settings.max_idle_count {
                            info!(
                                run_id = %self.run_id,
                                "Scheduler idle for {} checks, stopping",
                                idle_count
                            );
                            break;
                        }
                    } else {
                        idle_count = 0;
                    }
                }
            }
        }

        errors
    }

    /// Build the stock downloaders, analyzers and pipelines
    pub fn build_modules(&self) -> Result<ModuleArgs> {
        let settings = &self.config.modules;
        let client = self.http_client()?;

        let downloaders = (0..settings.downloaders)
            .map(|_| -> crate::errors::Result<Arc<dyn Downloader>> {
                let mid = Mid::new(ModuleType::Downloader, self.sn.get(), None);
                let downloader = HttpDownloader::new(mid, client.clone(), None)?;
                Ok(Arc::new(downloader))
            })
            .collect::<crate::errors::Result<Vec<_>>>()?;

        let analyzers = (0..settings.analyzers)
            .map(|_| -> crate::errors::Result<Arc<dyn Analyzer>> {
                let mid = Mid::new(ModuleType::Analyzer, self.sn.get(), None);
                let response_parsers = vec![parsers::link_parser(), parsers::page_parser()];
                let analyzer = ParserAnalyzer::new(mid, response_parsers, None)?;
                Ok(Arc::new(analyzer))
            })
            .collect::<crate::errors::Result<Vec<_>>>()?;

        let pipelines = (0..settings.pipelines)
            .map(|_| -> crate::errors::Result<Arc<dyn Pipeline>> {
                let mid = Mid::new(ModuleType::Pipeline, self.sn.get(), None);
                let processors = vec![log_item(), self.sink.processor()];
                let pipeline = ProcessorPipeline::new(mid, processors, None)?;
                pipeline.set_fail_fast(settings.fail_fast);
                Ok(Arc::new(pipeline))
            })
            .collect::<crate::errors::Result<Vec<_>>>()?;

        debug!(
            downloaders = downloaders.len(),
            analyzers = analyzers.len(),
            pipelines = pipelines.len(),
            "Built stock modules"
        );
        Ok(ModuleArgs {
            downloaders,
            analyzers,
            pipelines,
        })
    }

    fn http_client(&self) -> Result<Client> {
        let settings = &self.config.http;

        let mut headers = HeaderMap::new();
        for (name, value) in &settings.extra_headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .context(format!("Invalid header name: {}", name))?;
            let value = HeaderValue::from_str(value)
                .context(format!("Invalid value for header {}", name))?;
            headers.insert(name, value);
        }

        Client::builder()
            .user_agent(settings.user_agent.as_str())
            .timeout(settings.timeout())
            .default_headers(headers)
            .cookie_store(true)
            .build()
            .context("Failed to build the HTTP client")
    }
}

fn log_item() -> ItemProcessor {
    Arc::new(|item: Item| -> crate::errors::Result<Item> {
        if let Some(url) = item.get("url").and_then(|url| url.as_str()) {
            info!("Processed page: {}", url);
        }
        Ok(item)
    })
}
